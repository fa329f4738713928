use serde_json::json;

use super::{BRANCH, details};
use crate::DomainError;

pub const BRANCH_CODE_MIN: usize = 3;
pub const BRANCH_CODE_MAX: usize = 10;

pub fn branch_not_found(branch_id: i64) -> DomainError {
    DomainError::not_found(BRANCH, "branch", branch_id)
}

pub fn branch_not_found_by_code(branch_code: &str) -> DomainError {
    DomainError::not_found_by(BRANCH, "branch", details([("branch_code", json!(branch_code))]))
}

pub fn branch_not_found_by_location(city: &str, state: &str) -> DomainError {
    DomainError::not_found_by(BRANCH, "branch", details([("city", json!(city)), ("state", json!(state))]))
}

pub fn duplicate_branch_code(branch_code: &str) -> DomainError {
    DomainError::duplicate(BRANCH, "branch", "branch_code", branch_code)
}

pub fn invalid_branch_code_format(branch_code: &str) -> DomainError {
    DomainError::validation_with_rules(
        BRANCH,
        "branch_code",
        format!("Branch code must be {BRANCH_CODE_MIN}-{BRANCH_CODE_MAX} alphanumeric characters"),
        Some(branch_code.into()),
        details([
            ("min_length", json!(BRANCH_CODE_MIN)),
            ("max_length", json!(BRANCH_CODE_MAX)),
            ("pattern", json!("alphanumeric")),
        ]),
    )
}

pub fn branch_inactive(branch_id: i64) -> DomainError {
    DomainError::business_rule_with(
        BRANCH,
        "branch_status",
        "Branch is currently inactive",
        details([("branch_id", json!(branch_id)), ("status", json!("inactive"))]),
    )
}

pub fn branch_capacity_exceeded(branch_id: i64, current_capacity: u32, maximum_capacity: u32) -> DomainError {
    DomainError::business_rule_with(
        BRANCH,
        "branch_capacity",
        "Branch has reached maximum capacity",
        details([
            ("branch_id", json!(branch_id)),
            ("current_capacity", json!(current_capacity)),
            ("maximum_capacity", json!(maximum_capacity)),
        ]),
    )
}
