use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::Details;
use crate::sanitize::Sanitizer;

/// Client-facing error payload
///
/// Field names and optionality are a stable contract; clients match on `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: Timestamp,
}

/// Client-facing success payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSuccess<T> {
    pub success: bool,
    pub data: T,
    pub domain: String,
}

impl<T> WireSuccess<T> {
    pub fn new(data: T, domain: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            domain: domain.into(),
        }
    }
}

/// What may leave the process when an error is serialized
#[derive(Debug, Clone, Default)]
pub struct ClientPolicy {
    /// Render the cause chain into `details.cause`
    pub include_cause: bool,
    /// Render a captured backtrace into `details.stack_trace`
    pub include_stack_trace: bool,
    pub sanitizer: Sanitizer,
}
