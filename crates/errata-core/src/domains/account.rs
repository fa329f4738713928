use jiff::Timestamp;
use serde_json::{Value, json};

use super::{ACCOUNT, details};
use crate::DomainError;
use crate::sanitize::REDACTED;

/// Resource type of account records
pub const USER: &str = "user";

// -- lookups --

pub fn user_not_found_by_id(user_id: i64) -> DomainError {
    DomainError::not_found(ACCOUNT, USER, user_id)
}

pub fn user_not_found_by_email(email: &str) -> DomainError {
    DomainError::not_found_by(ACCOUNT, USER, details([("email", json!(email))]))
}

pub fn user_not_found_by_username(username: &str) -> DomainError {
    DomainError::not_found_by(ACCOUNT, USER, details([("username", json!(username))]))
}

// -- login --

pub fn email_not_found(email: &str) -> DomainError {
    DomainError::authentication_at(
        ACCOUNT,
        "email not found",
        "email_check",
        details([("email", json!(email)), ("user_found", json!(false))]),
    )
}

pub fn password_mismatch(email: &str) -> DomainError {
    DomainError::authentication_at(
        ACCOUNT,
        "password mismatch",
        "password_check",
        details([("email", json!(email)), ("user_found", json!(true))]),
    )
}

pub fn account_disabled(email: &str, reason: &str) -> DomainError {
    DomainError::authentication_at(
        ACCOUNT,
        format!("account disabled: {reason}"),
        "status_check",
        details([
            ("email", json!(email)),
            ("user_found", json!(true)),
            ("disabled_reason", json!(reason)),
        ]),
    )
}

/// Locked account; `unlock_time` is absent for indefinite locks
pub fn account_locked(email: &str, lock_reason: &str, unlock_time: Option<Timestamp>) -> DomainError {
    DomainError::authentication_at(
        ACCOUNT,
        format!("account locked: {lock_reason}"),
        "status_check",
        details([
            ("email", json!(email)),
            ("user_found", json!(true)),
            ("lock_reason", json!(lock_reason)),
            ("unlock_time", unlock_time.map_or(Value::Null, |at| at.to_string().into())),
        ]),
    )
}

// -- registration --

pub fn duplicate_email(email: &str) -> DomainError {
    DomainError::duplicate(ACCOUNT, USER, "email", email)
}

pub fn duplicate_username(username: &str) -> DomainError {
    DomainError::duplicate(ACCOUNT, USER, "username", username)
}

/// The password itself is never carried, only what it lacks
pub fn weak_password(requirements: &[&str]) -> DomainError {
    DomainError::validation_with_rules(
        ACCOUNT,
        "password",
        "Password does not meet security requirements",
        Some(REDACTED.into()),
        details([("requirements", json!(requirements))]),
    )
}

pub fn invalid_email_format(email: &str) -> DomainError {
    DomainError::validation_with_value(ACCOUNT, "email", "Invalid email format", email)
}

// -- state --

pub fn email_verification_required(user_id: i64, email: &str) -> DomainError {
    DomainError::business_rule_with(
        ACCOUNT,
        "email_verification_required",
        "Email verification is required to proceed",
        details([("user_id", json!(user_id)), ("email", json!(email))]),
    )
}

pub fn password_reset_required(user_id: i64) -> DomainError {
    DomainError::business_rule_with(
        ACCOUNT,
        "password_reset_required",
        "Password reset is required for security reasons",
        details([("user_id", json!(user_id))]),
    )
}

pub fn profile_incomplete(user_id: i64, missing_fields: &[&str]) -> DomainError {
    DomainError::business_rule_with(
        ACCOUNT,
        "profile_incomplete",
        "User profile must be completed before proceeding",
        details([("user_id", json!(user_id)), ("missing_fields", json!(missing_fields))]),
    )
}
