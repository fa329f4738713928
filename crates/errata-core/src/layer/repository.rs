use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::BoxError;
use crate::{CanonicalError, Details, DomainError, Kind, Layer};

const CONSTRAINT: &[&str] = &[
    "unique constraint",
    "duplicate key",
    "foreign key constraint",
    "check constraint",
    "unique_violation",
    "foreign_key_violation",
    "check_violation",
];

const CONNECTION: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timeout",
    "no connection",
    "database is locked",
    "server has gone away",
];

const TIMEOUT: &[&str] = &["timeout", "timed out", "deadline exceeded"];

fn contains_any(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| message.contains(needle))
}

/// Storage boundary of a domain
///
/// Turns driver failures into canonical errors that always carry the table
/// and the driver error as cause.
#[derive(Debug, Clone)]
pub struct RepositoryLayer {
    domain: String,
}

impl RepositoryLayer {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Classify a storage failure on `table`
    ///
    /// `context` holds the lookup identifiers, used both for not-found
    /// messages and to recover the value behind a duplicate.
    pub fn classify(
        &self,
        err: impl Into<BoxError>,
        table: &str,
        operation: &str,
        context: &Details,
    ) -> CanonicalError {
        let err = match err.into().downcast::<CanonicalError>() {
            Ok(canonical) => return self.pass_through(*canonical, operation),
            Err(other) => other,
        };

        let message = err.to_string();
        let lower = message.to_lowercase();
        let resource_type = table.strip_suffix('s').unwrap_or(table);

        let canonical = if lower.contains("no rows") {
            DomainError::not_found_by(&self.domain, resource_type, context.clone()).into()
        } else if contains_any(&lower, CONSTRAINT) {
            self.constraint(&message, &lower, resource_type, context)
        } else if contains_any(&lower, CONNECTION) {
            CanonicalError::from(DomainError::external_service(
                &self.domain,
                "database",
                operation,
                "Database connection failed",
                true,
            ))
        } else if lower.contains("deadlock") {
            CanonicalError::from(DomainError::system(
                &self.domain,
                "database",
                operation,
                "Database deadlock detected",
            ))
            .with_retryable(true)
            .with_detail("deadlock", true)
        } else if contains_any(&lower, TIMEOUT) {
            CanonicalError::new(Kind::Timeout, "Database operation timed out")
                .with_domain(self.domain.as_str())
                .with_detail("operation", operation)
        } else {
            CanonicalError::from(DomainError::system(
                &self.domain,
                "database",
                operation,
                format!("Database operation failed on table '{table}'"),
            ))
            .with_details(context.clone())
        };

        canonical
            .with_layer(Layer::Repository)
            .with_operation(operation)
            .with_detail("table", table)
            .with_cause(err)
    }

    fn constraint(&self, message: &str, lower: &str, resource_type: &str, context: &Details) -> CanonicalError {
        if lower.contains("unique") || lower.contains("duplicate") {
            let (field, value) = duplicate_field(message);
            let field = field.unwrap_or_else(|| "unknown_field".to_owned());
            let value = value.map(Value::from).or_else(|| context_value(context, &field)).unwrap_or(Value::Null);

            CanonicalError::from(DomainError::duplicate(&self.domain, resource_type, &field, value))
                .with_detail("constraint_type", "unique")
        } else if lower.contains("foreign key") || lower.contains("foreign_key") {
            CanonicalError::from(DomainError::business_rule(
                &self.domain,
                "foreign_key_constraint",
                "Referenced record does not exist or cannot be deleted due to dependencies",
            ))
            .with_detail("constraint_type", "foreign_key")
        } else {
            CanonicalError::from(DomainError::validation(
                &self.domain,
                "check_constraint",
                "Data violates database check constraint",
            ))
            .with_detail("constraint_type", "check")
        }
    }

    fn pass_through(&self, err: CanonicalError, operation: &str) -> CanonicalError {
        let err = err.or_domain(&self.domain).or_layer(Layer::Repository);

        if err.operation().is_some() {
            err
        } else {
            err.with_operation(operation)
        }
    }
}

/// Column and, when the driver reports it, the conflicting value
///
/// Understands `UNIQUE constraint failed: users.email` and
/// `Key (email)=(a@b.c) already exists`.
fn duplicate_field(message: &str) -> (Option<String>, Option<String>) {
    fn key_detail() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"Key \(([^)]+)\)=\(([^)]*)\)").expect("must be valid regex"))
    }

    if let Some(captures) = key_detail().captures(message) {
        return (Some(captures[1].to_owned()), Some(captures[2].to_owned()));
    }

    if let Some((_, columns)) = message.split_once("UNIQUE constraint failed:") {
        let column = columns.split(',').next().unwrap_or_default().trim();
        let column = column.rsplit('.').next().unwrap_or(column);
        if !column.is_empty() {
            return (Some(column.to_owned()), None);
        }
    }

    (None, None)
}

fn context_value(context: &Details, field: &str) -> Option<Value> {
    context
        .get(field)
        .or_else(|| context.get(&field.to_lowercase()))
        .or_else(|| context.get(&field.to_uppercase()))
        .cloned()
}
