use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

use crate::error::{BoxError, Cause, normalize_cause};
use crate::{CanonicalError, Details, Kind};

/// How a missing resource was looked up
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    Id(Value),
    Identifiers(Details),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, " with ID {}", plain(id)),
            Self::Identifiers(identifiers) if identifiers.is_empty() => Ok(()),
            Self::Identifiers(identifiers) => {
                let pairs: Vec<_> = identifiers.iter().map(|(k, v)| format!("{k}={}", plain(v))).collect();
                write!(f, " with {}", pairs.join(", "))
            }
        }
    }
}

/// Kind-specific payload with its mandatory fields compiled in
///
/// `Display` is the operator-facing description; the client message comes
/// from [`Failure::message`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
    #[error("{resource_type}{locator} not found")]
    NotFound { resource_type: String, locator: Locator },

    #[error("validation failed for field '{field}': {message}")]
    Validation {
        field: String,
        message: String,
        value: Option<Value>,
        rules: Details,
    },

    #[error("{resource_type} with {field}={} already exists", plain(.value))]
    Duplicate {
        resource_type: String,
        field: String,
        value: Value,
    },

    #[error("authentication failed{}: {reason}", at_step(.step))]
    Authentication {
        reason: String,
        step: Option<String>,
        context: Details,
    },

    #[error("not authorized to {action} {resource}")]
    Authorization {
        action: String,
        resource: String,
        context: Details,
    },

    #[error("business rule violation: {rule} - {description}")]
    BusinessLogic {
        rule: String,
        description: String,
        context: Details,
    },

    #[error("external service error in {service}.{operation}: {message}")]
    ExternalService {
        service: String,
        operation: String,
        message: String,
        retryable: bool,
    },

    #[error("{service} is unavailable")]
    ServiceUnavailable { service: String },

    #[error("system error in {component}.{operation}: {message}")]
    System {
        component: String,
        operation: String,
        message: String,
    },

    #[error("invalid input: {message}")]
    InvalidInput { message: String, context: Details },

    #[error("rate limit exceeded for {operation}")]
    RateLimit {
        operation: String,
        limit: Option<u64>,
        time_window: Option<String>,
    },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{resource_type} conflict: {reason}")]
    Conflict { resource_type: String, reason: String },

    #[error("database {operation} failed on {table}")]
    Database { operation: String, table: String },
}

impl Failure {
    pub const fn kind(&self) -> Kind {
        match self {
            Self::NotFound { .. } => Kind::NotFound,
            Self::Validation { .. } => Kind::Validation,
            Self::Duplicate { .. } => Kind::Duplicate,
            Self::Authentication { .. } => Kind::Authentication,
            Self::Authorization { .. } => Kind::Authorization,
            Self::BusinessLogic { .. } => Kind::BusinessLogic,
            Self::ExternalService { .. } => Kind::ExternalService,
            Self::ServiceUnavailable { .. } => Kind::ServiceUnavailable,
            Self::System { .. } => Kind::System,
            Self::InvalidInput { .. } => Kind::InvalidInput,
            Self::RateLimit { .. } => Kind::RateLimit,
            Self::Timeout { .. } => Kind::Timeout,
            Self::Conflict { .. } => Kind::Conflict,
            Self::Database { .. } => Kind::Database,
        }
    }

    pub const fn retryable(&self) -> bool {
        match self {
            Self::ExternalService { retryable, .. } => *retryable,
            other => other.kind().default_retryable(),
        }
    }

    /// Client-visible message
    pub fn message(&self) -> String {
        match self {
            Self::NotFound { .. } | Self::Duplicate { .. } => self.to_string(),
            Self::Validation { message, .. }
            | Self::InvalidInput { message, .. }
            | Self::Conflict { reason: message, .. } => message.clone(),
            Self::Authentication { .. } => "Authentication failed".to_owned(),
            Self::Authorization { .. } => "Access denied".to_owned(),
            Self::BusinessLogic { description, .. } => description.clone(),
            Self::ExternalService { .. } => "External service error".to_owned(),
            Self::ServiceUnavailable { .. } => "Service temporarily unavailable".to_owned(),
            Self::System { .. } => "Internal system error".to_owned(),
            Self::RateLimit { .. } => "Rate limit exceeded. Please try again later.".to_owned(),
            Self::Timeout { .. } => "Operation timed out".to_owned(),
            Self::Database { .. } => "Database operation failed".to_owned(),
        }
    }

    /// Lower the payload into the wire `details` shape
    pub fn details(&self) -> Details {
        let mut details = Details::new();

        match self {
            Self::NotFound { resource_type, locator } => {
                details.insert("resource_type".into(), resource_type.as_str().into());
                match locator {
                    Locator::Id(id) => details.insert("resource_id".into(), id.clone()),
                    Locator::Identifiers(identifiers) => {
                        details.insert("identifiers".into(), Value::Object(identifiers.clone()))
                    }
                };
            }
            Self::Validation { field, value, rules, .. } => {
                details.insert("field".into(), field.as_str().into());
                if let Some(value) = value {
                    details.insert("value".into(), value.clone());
                }
                if !rules.is_empty() {
                    details.insert("rules".into(), Value::Object(rules.clone()));
                }
            }
            Self::Duplicate {
                resource_type,
                field,
                value,
            } => {
                details.insert("resource_type".into(), resource_type.as_str().into());
                details.insert("field".into(), field.as_str().into());
                details.insert("value".into(), value.clone());
            }
            Self::Authentication { reason, step, context } => {
                details.insert("reason".into(), reason.as_str().into());
                if let Some(step) = step {
                    details.insert("step".into(), step.as_str().into());
                }
                details.extend(context.clone());
            }
            Self::Authorization {
                action,
                resource,
                context,
            } => {
                details.insert("action".into(), action.as_str().into());
                details.insert("resource".into(), resource.as_str().into());
                details.extend(context.clone());
            }
            Self::BusinessLogic {
                rule,
                description,
                context,
            } => {
                details.insert("rule".into(), rule.as_str().into());
                details.insert("description".into(), description.as_str().into());
                details.extend(context.clone());
            }
            Self::ExternalService {
                service,
                operation,
                retryable,
                ..
            } => {
                details.insert("service".into(), service.as_str().into());
                details.insert("operation".into(), operation.as_str().into());
                details.insert("retryable".into(), (*retryable).into());
            }
            Self::ServiceUnavailable { service } => {
                details.insert("service".into(), service.as_str().into());
            }
            Self::System { component, operation, .. } => {
                details.insert("component".into(), component.as_str().into());
                details.insert("operation".into(), operation.as_str().into());
            }
            Self::InvalidInput { context, .. } => details.extend(context.clone()),
            Self::RateLimit {
                operation,
                limit,
                time_window,
            } => {
                details.insert("operation".into(), operation.as_str().into());
                if let Some(limit) = limit {
                    details.insert("limit".into(), (*limit).into());
                }
                if let Some(window) = time_window {
                    details.insert("time_window".into(), window.as_str().into());
                }
            }
            Self::Timeout { operation } => {
                details.insert("operation".into(), operation.as_str().into());
            }
            Self::Conflict { resource_type, .. } => {
                details.insert("resource_type".into(), resource_type.as_str().into());
            }
            Self::Database { operation, table } => {
                details.insert("operation".into(), operation.as_str().into());
                details.insert("table".into(), table.as_str().into());
            }
        }

        details
    }
}

/// A typed failure tagged with the domain that raised it
///
/// Converting into [`CanonicalError`] applies the kind's default status and
/// code, lowers the payload into `details` and keeps the cause.
#[derive(Debug, Clone)]
pub struct DomainError {
    domain: String,
    failure: Failure,
    cause: Option<Cause>,
}

impl DomainError {
    pub fn new(domain: impl Into<String>, failure: Failure) -> Self {
        Self {
            domain: domain.into(),
            failure,
            cause: None,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub const fn failure(&self) -> &Failure {
        &self.failure
    }

    pub const fn kind(&self) -> Kind {
        self.failure.kind()
    }

    /// Attach the underlying failure
    pub fn with_cause(self, cause: impl Into<BoxError>) -> Self {
        Self {
            cause: Some(normalize_cause(cause.into())),
            ..self
        }
    }

    // -- constructors, one per kind --

    pub fn not_found(domain: &str, resource_type: &str, id: impl Into<Value>) -> Self {
        Self::new(
            domain,
            Failure::NotFound {
                resource_type: resource_type.to_owned(),
                locator: Locator::Id(id.into()),
            },
        )
    }

    pub fn not_found_by(domain: &str, resource_type: &str, identifiers: Details) -> Self {
        Self::new(
            domain,
            Failure::NotFound {
                resource_type: resource_type.to_owned(),
                locator: Locator::Identifiers(identifiers),
            },
        )
    }

    pub fn validation(domain: &str, field: &str, message: impl Into<String>) -> Self {
        Self::new(
            domain,
            Failure::Validation {
                field: field.to_owned(),
                message: message.into(),
                value: None,
                rules: Details::new(),
            },
        )
    }

    pub fn validation_with_value(
        domain: &str,
        field: &str,
        message: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(
            domain,
            Failure::Validation {
                field: field.to_owned(),
                message: message.into(),
                value: Some(value.into()),
                rules: Details::new(),
            },
        )
    }

    pub fn validation_with_rules(
        domain: &str,
        field: &str,
        message: impl Into<String>,
        value: Option<Value>,
        rules: Details,
    ) -> Self {
        Self::new(
            domain,
            Failure::Validation {
                field: field.to_owned(),
                message: message.into(),
                value,
                rules,
            },
        )
    }

    pub fn duplicate(domain: &str, resource_type: &str, field: &str, value: impl Into<Value>) -> Self {
        Self::new(
            domain,
            Failure::Duplicate {
                resource_type: resource_type.to_owned(),
                field: field.to_owned(),
                value: value.into(),
            },
        )
    }

    pub fn authentication(domain: &str, reason: impl Into<String>) -> Self {
        Self::new(
            domain,
            Failure::Authentication {
                reason: reason.into(),
                step: None,
                context: Details::new(),
            },
        )
    }

    pub fn authentication_at(domain: &str, reason: impl Into<String>, step: &str, context: Details) -> Self {
        Self::new(
            domain,
            Failure::Authentication {
                reason: reason.into(),
                step: Some(step.to_owned()),
                context,
            },
        )
    }

    pub fn authorization(domain: &str, action: &str, resource: &str) -> Self {
        Self::authorization_with(domain, action, resource, Details::new())
    }

    pub fn authorization_with(domain: &str, action: &str, resource: &str, context: Details) -> Self {
        Self::new(
            domain,
            Failure::Authorization {
                action: action.to_owned(),
                resource: resource.to_owned(),
                context,
            },
        )
    }

    pub fn business_rule(domain: &str, rule: &str, description: impl Into<String>) -> Self {
        Self::business_rule_with(domain, rule, description, Details::new())
    }

    pub fn business_rule_with(domain: &str, rule: &str, description: impl Into<String>, context: Details) -> Self {
        Self::new(
            domain,
            Failure::BusinessLogic {
                rule: rule.to_owned(),
                description: description.into(),
                context,
            },
        )
    }

    pub fn external_service(
        domain: &str,
        service: &str,
        operation: &str,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::new(
            domain,
            Failure::ExternalService {
                service: service.to_owned(),
                operation: operation.to_owned(),
                message: message.into(),
                retryable,
            },
        )
    }

    pub fn service_unavailable(domain: &str, service: &str) -> Self {
        Self::new(
            domain,
            Failure::ServiceUnavailable {
                service: service.to_owned(),
            },
        )
    }

    pub fn system(domain: &str, component: &str, operation: &str, message: impl Into<String>) -> Self {
        Self::new(
            domain,
            Failure::System {
                component: component.to_owned(),
                operation: operation.to_owned(),
                message: message.into(),
            },
        )
    }

    pub fn invalid_input(domain: &str, message: impl Into<String>, context: Details) -> Self {
        Self::new(
            domain,
            Failure::InvalidInput {
                message: message.into(),
                context,
            },
        )
    }

    pub fn rate_limited(domain: &str, operation: &str, limit: Option<u64>, time_window: Option<String>) -> Self {
        Self::new(
            domain,
            Failure::RateLimit {
                operation: operation.to_owned(),
                limit,
                time_window,
            },
        )
    }

    pub fn timeout(domain: &str, operation: &str) -> Self {
        Self::new(
            domain,
            Failure::Timeout {
                operation: operation.to_owned(),
            },
        )
    }

    pub fn conflict(domain: &str, resource_type: &str, reason: impl Into<String>) -> Self {
        Self::new(
            domain,
            Failure::Conflict {
                resource_type: resource_type.to_owned(),
                reason: reason.into(),
            },
        )
    }

    pub fn database(domain: &str, operation: &str, table: &str) -> Self {
        Self::new(
            domain,
            Failure::Database {
                operation: operation.to_owned(),
                table: table.to_owned(),
            },
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.failure, f)
    }
}

impl StdError for DomainError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<DomainError> for CanonicalError {
    fn from(err: DomainError) -> Self {
        let failure = err.failure;

        Self::new(failure.kind(), failure.message())
            .with_domain(err.domain)
            .with_retryable(failure.retryable())
            .with_details(failure.details())
            .with_shared_cause(err.cause)
    }
}

#[allow(clippy::ref_option)]
fn at_step(step: &Option<String>) -> String {
    step.as_ref().map(|step| format!(" at {step}")).unwrap_or_default()
}

/// Render a JSON value the way a human writes it: strings unquoted
pub(crate) fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
