use serde_json::json;

use super::{ADMIN, details};
use crate::DomainError;

pub fn insufficient_admin_privileges(user_id: i64, required_role: &str, current_role: &str) -> DomainError {
    DomainError::authorization_with(
        ADMIN,
        "admin_operation",
        "system",
        details([
            ("user_id", json!(user_id)),
            ("required_role", json!(required_role)),
            ("current_role", json!(current_role)),
        ]),
    )
}

pub fn system_maintenance_mode() -> DomainError {
    DomainError::business_rule(ADMIN, "system_maintenance", "System is currently in maintenance mode")
}

pub fn bulk_operation_limit(operation: &str, requested: usize, max_allowed: usize) -> DomainError {
    DomainError::business_rule_with(
        ADMIN,
        "bulk_operation_limit",
        format!("Bulk {operation} operation exceeds maximum limit"),
        details([
            ("operation", json!(operation)),
            ("requested", json!(requested)),
            ("max_allowed", json!(max_allowed)),
        ]),
    )
}

pub fn bulk_operation_partial_failure(
    operation: &str,
    total_requested: usize,
    successful: usize,
    failures: &[String],
) -> DomainError {
    let failed = failures.len();

    DomainError::business_rule_with(
        ADMIN,
        "bulk_operation_partial_failure",
        format!("Bulk {operation} operation completed with {failed} failures out of {total_requested} requests"),
        details([
            ("operation", json!(operation)),
            ("total_requested", json!(total_requested)),
            ("successful_count", json!(successful)),
            ("failed_count", json!(failed)),
            ("failure_details", json!(failures)),
        ]),
    )
}

#[allow(clippy::cast_precision_loss)]
pub fn resource_quota_exceeded(resource_type: &str, current_usage: u64, maximum_quota: u64) -> DomainError {
    let usage_percent = if maximum_quota == 0 {
        100.0
    } else {
        current_usage as f64 / maximum_quota as f64 * 100.0
    };

    DomainError::business_rule_with(
        ADMIN,
        "resource_quota",
        format!("{resource_type} quota exceeded"),
        details([
            ("resource_type", json!(resource_type)),
            ("current_usage", json!(current_usage)),
            ("maximum_quota", json!(maximum_quota)),
            ("usage_percent", json!(usage_percent)),
        ]),
    )
}
