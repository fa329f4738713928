use serde_json::Value;

use crate::error::BoxError;
use crate::{CanonicalError, Details, DomainError};

/// Lift any error into a canonical error with no domain
///
/// Canonical errors pass through untouched, typed domain errors are promoted
/// with their kind's defaults, and anything else goes through the
/// foreign-message classifier.
pub fn to_canonical(err: impl Into<BoxError>) -> CanonicalError {
    lift(err, "", &Details::new())
}

/// Lift an error on behalf of a domain
///
/// `context` feeds the classifier for foreign errors: lookup identifiers for
/// not-found, `field`/`value` for duplicates, `lock_reason`, `service`,
/// `operation`.
pub fn lift(err: impl Into<BoxError>, domain: &str, context: &Details) -> CanonicalError {
    let err = match err.into().downcast::<CanonicalError>() {
        Ok(canonical) => return *canonical,
        Err(other) => other,
    };

    let err = match err.downcast::<DomainError>() {
        Ok(typed) => return (*typed).into(),
        Err(other) => other,
    };

    classify_foreign(err, domain, context)
}

/// Broad bucket a foreign error message falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignClass {
    NotFound,
    BadCredentials,
    EmailNotFound,
    AccountDisabled,
    AccountLocked,
    Duplicate,
    ForeignKey,
    Unavailable,
    Deadlock,
    Timeout,
}

// First match wins. `email not found` sits ahead of the generic
// `not found` bucket, which would otherwise swallow it.
const RULES: &[(ForeignClass, &[&str])] = &[
    (ForeignClass::EmailNotFound, &["email not found"]),
    (ForeignClass::NotFound, &["not found", "no rows"]),
    (
        ForeignClass::BadCredentials,
        &["invalid password", "password mismatch", "invalid credentials"],
    ),
    (ForeignClass::AccountDisabled, &["account disabled"]),
    (ForeignClass::AccountLocked, &["account locked"]),
    (
        ForeignClass::Duplicate,
        &["already exists", "unique constraint", "duplicate key"],
    ),
    (ForeignClass::ForeignKey, &["foreign key"]),
    (ForeignClass::Unavailable, &["connection refused", "unavailable"]),
    (ForeignClass::Deadlock, &["deadlock"]),
    (ForeignClass::Timeout, &["timeout", "deadline exceeded"]),
];

/// Case-insensitive substring classification of an error message
pub fn classify_message(message: &str) -> Option<ForeignClass> {
    let message = message.to_lowercase();

    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| message.contains(needle)))
        .map(|(class, _)| *class)
}

/// Canonical error for a foreign failure, keeping it as the cause
pub fn classify_foreign(err: BoxError, domain: &str, context: &Details) -> CanonicalError {
    let message = err.to_string();

    let canonical = match classify_message(&message) {
        Some(class) => from_class(class, domain, context, &message),
        None => CanonicalError::from(DomainError::system(domain, "unknown", "unknown", message)).with_backtrace(),
    };

    canonical.with_cause(err)
}

pub(crate) fn from_class(class: ForeignClass, domain: &str, context: &Details, message: &str) -> CanonicalError {
    let resource_type = if domain.is_empty() { "resource" } else { domain };
    let text = |key: &str, fallback: &str| {
        context
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_owned()
    };

    let typed = match class {
        ForeignClass::NotFound => DomainError::not_found_by(domain, resource_type, context.clone()),
        ForeignClass::BadCredentials => {
            DomainError::authentication_at(domain, "invalid credentials", "password_check", context.clone())
        }
        ForeignClass::EmailNotFound => {
            let mut context = context.clone();
            context.insert("user_found".into(), Value::Bool(false));
            DomainError::authentication_at(domain, "email not found", "email_check", context)
        }
        ForeignClass::AccountDisabled => {
            DomainError::authentication_at(domain, "account disabled", "status_check", context.clone())
        }
        ForeignClass::AccountLocked => {
            let mut context = context.clone();
            context.insert("lock_reason".into(), text("lock_reason", "unspecified").into());
            DomainError::authentication_at(domain, "account locked", "status_check", context)
        }
        ForeignClass::Duplicate => {
            let field = text("field", "identifier");
            let value = context
                .get(&field)
                .or_else(|| context.get("value"))
                .cloned()
                .unwrap_or(Value::Null);
            DomainError::duplicate(domain, resource_type, &field, value)
        }
        ForeignClass::ForeignKey => DomainError::business_rule_with(
            domain,
            "foreign_key_constraint",
            "Referenced record does not exist or cannot be deleted due to dependencies",
            context.clone(),
        ),
        ForeignClass::Unavailable => DomainError::external_service(
            domain,
            &text("service", "upstream"),
            &text("operation", "unknown"),
            message,
            true,
        ),
        ForeignClass::Deadlock => {
            return CanonicalError::from(DomainError::system(
                domain,
                "database",
                &text("operation", "unknown"),
                message,
            ))
            .with_retryable(true)
            .with_detail("deadlock", true);
        }
        ForeignClass::Timeout => DomainError::timeout(domain, &text("operation", "unknown")),
    };

    typed.into()
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use proptest::prelude::*;
    use regex::Regex;
    use serde_json::json;

    use super::*;
    use crate::Kind;

    fn context(value: Value) -> Details {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unclassified_errors_surface_stack_trace_when_enabled() {
        let debug = crate::ClientPolicy {
            include_stack_trace: true,
            ..crate::ClientPolicy::default()
        };

        let err = classify_foreign(BoxError::from("disk on fire"), "account", &Details::new());
        assert!(err.backtrace().is_some());
        assert!(!err.to_wire(&crate::ClientPolicy::default()).details.contains_key("stack_trace"));
        assert!(err.to_wire(&debug).details["stack_trace"].is_string());

        let classified = classify_foreign(BoxError::from("connection refused"), "account", &Details::new());
        assert!(!classified.to_wire(&debug).details.contains_key("stack_trace"));
    }

    #[test]
    fn canonical_passes_through() {
        let original = CanonicalError::new(Kind::Conflict, "stale write").with_domain("branch");
        let lifted = to_canonical(original.clone());

        assert_eq!(lifted.code(), original.code());
        assert_eq!(lifted.timestamp(), original.timestamp());
        assert!(lifted.cause().is_none());
    }

    #[test]
    fn typed_errors_are_promoted() {
        let lifted = to_canonical(DomainError::duplicate("account", "user", "email", "a@b.c"));

        assert_eq!(lifted.code(), "account_DUPLICATE");
        assert_eq!(lifted.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn foreign_table_order() {
        let cases = [
            ("sql: no rows in result set", Kind::NotFound),
            ("record NOT FOUND", Kind::NotFound),
            ("email not found", Kind::Authentication),
            ("invalid credentials supplied", Kind::Authentication),
            ("account disabled by admin", Kind::Authentication),
            ("account locked", Kind::Authentication),
            ("pq: duplicate key value violates unique constraint", Kind::Duplicate),
            ("violates foreign key constraint", Kind::BusinessLogic),
            ("connection refused to db", Kind::ExternalService),
            ("rpc error: code = Unavailable", Kind::ExternalService),
            ("deadlock detected", Kind::System),
            ("context deadline exceeded", Kind::Timeout),
            ("i/o timeout", Kind::Timeout),
            ("something odd", Kind::System),
        ];

        for (message, kind) in cases {
            let lifted = lift(message, "account", &Details::new());
            assert_eq!(lifted.kind(), kind, "{message}");
            assert_eq!(lifted.domain(), "account");
        }
    }

    #[test]
    fn connection_refused_is_retryable_unavailable() {
        let lifted = to_canonical("connection refused to db");

        assert_eq!(lifted.kind(), Kind::ExternalService);
        assert!(lifted.retryable());
        assert_eq!(lifted.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(lifted.cause().unwrap().to_string(), "connection refused to db");
    }

    #[test]
    fn not_found_uses_context_identifiers() {
        let lifted = lift("no rows", "branch", &context(json!({"code": "HQ"})));

        assert_eq!(lifted.message(), "branch with code=HQ not found");
        assert_eq!(lifted.details()["identifiers"], json!({"code": "HQ"}));
    }

    #[test]
    fn auth_buckets_record_steps() {
        let lifted = lift("email not found", "account", &Details::new());
        assert_eq!(lifted.details()["step"], json!("email_check"));
        assert_eq!(lifted.details()["user_found"], json!(false));

        let lifted = lift("password mismatch", "account", &Details::new());
        assert_eq!(lifted.details()["step"], json!("password_check"));

        let lifted = lift("account locked", "account", &context(json!({"lock_reason": "too many attempts"})));
        assert_eq!(lifted.details()["step"], json!("status_check"));
        assert_eq!(lifted.details()["lock_reason"], json!("too many attempts"));
    }

    #[test]
    fn duplicate_takes_field_from_context() {
        let lifted = lift(
            "user already exists",
            "account",
            &context(json!({"field": "email", "email": "a@b.c"})),
        );

        assert_eq!(lifted.details()["field"], json!("email"));
        assert_eq!(lifted.details()["value"], json!("a@b.c"));
    }

    #[test]
    fn deadlock_is_retryable_system_error() {
        let lifted = to_canonical("Deadlock found when trying to get lock");

        assert_eq!(lifted.kind(), Kind::System);
        assert!(lifted.retryable());
        assert_eq!(lifted.details()["deadlock"], json!(true));
    }

    #[test]
    fn unknown_errors_become_system_errors_with_cause() {
        let lifted = to_canonical(std::io::Error::other("disk on fire"));

        assert_eq!(lifted.code(), "SYSTEM_ERROR");
        assert_eq!(lifted.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(lifted.cause().unwrap().to_string(), "disk on fire");
    }

    fn code_pattern() -> Regex {
        Regex::new(r"^[a-z_]*_?[A-Z_]+$").unwrap()
    }

    proptest! {
        #[test]
        fn any_message_lifts_to_a_valid_code(
            message in ".*",
            domain in proptest::sample::select(vec!["", "account", "auth", "branch", "admin", "system"]),
        ) {
            let lifted = lift(message, domain, &Details::new());
            prop_assert!(code_pattern().is_match(&lifted.code()), "{}", lifted.code());
        }

        #[test]
        fn lifting_is_idempotent(message in ".*") {
            let once = to_canonical(message);
            let twice = to_canonical(once.clone());

            prop_assert_eq!(once.code(), twice.code());
            prop_assert_eq!(once.message(), twice.message());
            prop_assert_eq!(once.status(), twice.status());
            prop_assert_eq!(once.details(), twice.details());
            prop_assert_eq!(once.timestamp(), twice.timestamp());
        }
    }
}
