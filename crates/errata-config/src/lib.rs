#![allow(clippy::must_use_candidate)]

mod env;
pub mod errors;
pub mod health;
mod loader;
pub mod rate_limit;
pub mod routing;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use errors::*;
pub use health::*;
pub use rate_limit::*;
pub use routing::*;
pub use server::*;
pub use telemetry::*;

/// Top-level errata configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listener and health endpoint
    #[serde(default)]
    pub server: ServerConfig,
    /// Error surfacing policy
    #[serde(default)]
    pub errors: ErrorsConfig,
    /// Path prefix to domain mapping; the built-in table applies when absent
    #[serde(default)]
    pub routing: Option<RoutingConfig>,
    /// Per-domain rate limits, enforced only when present
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Log output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
