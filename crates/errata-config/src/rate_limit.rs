use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Per-domain request limits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Domain name to limit
    #[serde(default)]
    pub domains: BTreeMap<String, DomainRateLimit>,
}

/// Request limit applied to each client of one domain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainRateLimit {
    /// Maximum requests per window
    pub limit: u32,
    /// Window duration (e.g. "1m", "1h")
    pub window: String,
}

impl DomainRateLimit {
    /// Parsed window
    pub fn window_duration(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.window).map_err(|e| anyhow::anyhow!("invalid duration '{}': {e}", self.window))
    }
}
