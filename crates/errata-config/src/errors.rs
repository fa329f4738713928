use errata_core::{DEFAULT_DOMAINS, DEFAULT_SENSITIVE_FIELDS};
use serde::Deserialize;

/// What errors may reveal and how they are logged
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorsConfig {
    /// Domains that may prefix an error code; `system` is always included
    #[serde(default = "default_known_domains")]
    pub known_domains: Vec<String>,
    /// Render the cause chain into client details (keep off in production)
    #[serde(default)]
    pub include_cause: bool,
    /// Render captured backtraces into client details (keep off in production)
    #[serde(default)]
    pub include_stack_trace: bool,
    /// Log 4xx validation and business errors at info
    #[serde(default)]
    pub log_client_errors: bool,
    /// Detail keys whose values are always redacted
    #[serde(default = "default_sensitive_fields")]
    pub sensitive_fields: Vec<String>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            known_domains: default_known_domains(),
            include_cause: false,
            include_stack_trace: false,
            log_client_errors: false,
            sensitive_fields: default_sensitive_fields(),
        }
    }
}

fn default_known_domains() -> Vec<String> {
    DEFAULT_DOMAINS.iter().map(ToString::to_string).collect()
}

fn default_sensitive_fields() -> Vec<String> {
    DEFAULT_SENSITIVE_FIELDS.iter().map(ToString::to_string).collect()
}
