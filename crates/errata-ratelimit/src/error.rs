use std::time::Duration;

use thiserror::Error;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Configuration error
    #[error("rate limit configuration error: {0}")]
    Config(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded for {domain}: {limit} requests per {window:?}")]
    Exceeded {
        domain: String,
        /// Seconds until the next request is admitted
        retry_after: u64,
        limit: u32,
        window: Duration,
    },
}
