use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};

use crate::error::RateLimitError;

type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// In-memory keyed limiter backed by governor
///
/// Admits bursts of up to `limit` requests per key, replenishing evenly
/// across `window`.
pub struct MemoryLimiter {
    limiter: KeyedLimiter,
    clock: DefaultClock,
}

impl MemoryLimiter {
    pub fn new(limit: u32, window: Duration) -> Result<Self, RateLimitError> {
        if window.is_zero() {
            return Err(RateLimitError::Config("rate limit window must be > 0".to_string()));
        }

        let burst = NonZeroU32::new(limit).ok_or_else(|| RateLimitError::Config("limit must be > 0".to_string()))?;

        let quota = Quota::with_period(window / limit)
            .ok_or_else(|| RateLimitError::Config("invalid rate limit period".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: RateLimiter::dashmap(quota),
            clock: DefaultClock::default(),
        })
    }

    /// Admit one request for `key`, or report how long until it would be admitted
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&key.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}
