use jiff::{SignedDuration, Timestamp};
use serde_json::json;

use super::{AUTH, details};
use crate::DomainError;

pub fn invalid_token(token_type: &str) -> DomainError {
    DomainError::authentication_at(
        AUTH,
        format!("invalid {token_type} token"),
        "token_validation",
        details([("token_type", json!(token_type))]),
    )
}

pub fn expired_token(token_type: &str, expired_at: Timestamp) -> DomainError {
    DomainError::authentication_at(
        AUTH,
        format!("{token_type} token has expired"),
        "token_validation",
        details([
            ("token_type", json!(token_type)),
            ("expired_at", json!(expired_at.to_string())),
        ]),
    )
}

pub fn missing_token(token_type: &str) -> DomainError {
    DomainError::authentication_at(
        AUTH,
        format!("missing {token_type} token"),
        "token_validation",
        details([("token_type", json!(token_type))]),
    )
}

pub fn session_expired(session_id: &str) -> DomainError {
    DomainError::authentication_at(
        AUTH,
        "session has expired",
        "session_validation",
        details([("session_id", json!(session_id))]),
    )
}

pub fn invalid_session(session_id: &str) -> DomainError {
    DomainError::authentication_at(
        AUTH,
        "invalid session",
        "session_validation",
        details([("session_id", json!(session_id))]),
    )
}

pub fn insufficient_permissions(user_id: i64, required_permission: &str, user_permissions: &[&str]) -> DomainError {
    DomainError::authorization_with(
        AUTH,
        "access",
        "resource",
        details([
            ("user_id", json!(user_id)),
            ("required_permission", json!(required_permission)),
            ("user_permissions", json!(user_permissions)),
        ]),
    )
}

pub fn role_not_authorized(user_id: i64, user_role: &str, required_role: &str) -> DomainError {
    DomainError::authorization_with(
        AUTH,
        "role_access",
        "resource",
        details([
            ("user_id", json!(user_id)),
            ("user_role", json!(user_role)),
            ("required_role", json!(required_role)),
        ]),
    )
}

/// Login throttled by business policy, distinct from transport rate limiting
pub fn too_many_login_attempts(email: &str, remaining: SignedDuration) -> DomainError {
    DomainError::business_rule_with(
        AUTH,
        "login_rate_limit",
        "Too many login attempts. Please try again later",
        details([
            ("email", json!(email)),
            ("remaining_time", json!(format!("{remaining:#}"))),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::CanonicalError;

    #[test]
    fn token_failures_are_auth_domain() {
        let err: CanonicalError = invalid_token("access").into();

        assert_eq!(err.code(), "auth_AUTHENTICATION_ERROR");
        assert_eq!(err.details()["step"], json!("token_validation"));
        assert_eq!(err.details()["reason"], json!("invalid access token"));
    }

    #[test]
    fn role_checks_are_forbidden() {
        let err: CanonicalError = role_not_authorized(7, "viewer", "admin").into();

        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "Access denied");
        assert_eq!(err.details()["required_role"], json!("admin"));
    }

    #[test]
    fn login_throttle_is_business_rule() {
        let err: CanonicalError = too_many_login_attempts("a@b.c", SignedDuration::from_secs(90)).into();

        assert_eq!(err.code(), "auth_BUSINESS_LOGIC_ERROR");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.details()["remaining_time"].is_string());
    }
}
