use std::collections::BTreeMap;

use http::StatusCode;
use serde_json::Value;
use strum::{AsRefStr, Display};

use crate::{CanonicalError, Kind};

/// String-keyed structured fields attached to a log entry
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Destination for error log entries
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, attributes: &Attributes);
}

/// Forwards entries to `tracing`, attributes rendered as one JSON field
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, attributes: &Attributes) {
        let attributes = serde_json::to_string(attributes).unwrap_or_default();

        match level {
            LogLevel::Debug => tracing::debug!(%attributes, "{message}"),
            LogLevel::Info => tracing::info!(%attributes, "{message}"),
            LogLevel::Warning => tracing::warn!(%attributes, "{message}"),
            LogLevel::Error => tracing::error!(%attributes, "{message}"),
        }
    }
}

/// How a surfaced error should be logged, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDecision {
    pub level: LogLevel,
    pub message: &'static str,
    /// Whether security audit fields should be attached
    pub audit: bool,
}

/// Map an error to its log level
///
/// Throttling, timeouts and upstream failures log at warning. Remaining
/// server errors log at error. Authentication failures log at warning with
/// audit fields. Other client errors log at info when `log_client_errors`
/// is on and not at all otherwise.
pub fn log_decision(err: &CanonicalError, log_client_errors: bool) -> Option<LogDecision> {
    let status = err.status();

    let decision = |level, message| LogDecision {
        level,
        message,
        audit: false,
    };

    // Upstream failures are 5xx but transient from our side
    if matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT)
        || err.kind() == Kind::ExternalService
    {
        return Some(decision(LogLevel::Warning, "transient failure"));
    }

    if status.is_server_error() {
        return Some(decision(LogLevel::Error, "server error"));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Some(LogDecision {
            level: LogLevel::Warning,
            message: "authentication failure",
            audit: true,
        });
    }

    log_client_errors.then(|| decision(LogLevel::Info, "client error"))
}
