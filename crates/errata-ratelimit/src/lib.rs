#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod error;
mod memory;
mod registry;

pub use error::RateLimitError;
pub use memory::MemoryLimiter;
pub use registry::DomainLimiterRegistry;

use errata_config::RateLimitConfig;

/// Create a per-domain limiter registry from configuration
pub fn create_registry(config: &RateLimitConfig) -> Result<DomainLimiterRegistry, RateLimitError> {
    DomainLimiterRegistry::new(config)
}
