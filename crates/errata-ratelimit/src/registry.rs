use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use errata_config::RateLimitConfig;

use crate::error::RateLimitError;
use crate::memory::MemoryLimiter;

#[derive(Debug, Clone, Copy)]
struct Rule {
    limit: u32,
    window: Duration,
}

/// Per-domain limiters, created on first use
///
/// Lookups take the read lock; only the first request to a domain takes
/// the write lock to build its limiter. Per-client bookkeeping lives in the
/// limiter itself.
pub struct DomainLimiterRegistry {
    rules: HashMap<String, Rule>,
    limiters: RwLock<HashMap<String, Arc<MemoryLimiter>>>,
}

impl DomainLimiterRegistry {
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let mut rules = HashMap::with_capacity(config.domains.len());

        for (domain, limit) in &config.domains {
            let window = limit
                .window_duration()
                .map_err(|e| RateLimitError::Config(format!("{domain}: {e}")))?;

            // Validate the quota up front
            MemoryLimiter::new(limit.limit, window)?;

            rules.insert(
                domain.clone(),
                Rule {
                    limit: limit.limit,
                    window,
                },
            );
        }

        Ok(Self {
            rules,
            limiters: RwLock::new(HashMap::new()),
        })
    }

    /// Whether any limit applies to `domain`
    pub fn is_limited(&self, domain: &str) -> bool {
        self.rules.contains_key(domain)
    }

    /// Admit one request from `client` to `domain`
    ///
    /// Domains without a configured limit always admit.
    pub fn check(&self, domain: &str, client: &str) -> Result<(), RateLimitError> {
        let Some(rule) = self.rules.get(domain).copied() else {
            return Ok(());
        };

        let limiter = self.limiter(domain, rule)?;

        limiter.check(client).map_err(|wait| {
            tracing::debug!(domain, client, "rate limit exceeded");

            RateLimitError::Exceeded {
                domain: domain.to_string(),
                retry_after: wait.as_secs().max(1),
                limit: rule.limit,
                window: rule.window,
            }
        })
    }

    fn limiter(&self, domain: &str, rule: Rule) -> Result<Arc<MemoryLimiter>, RateLimitError> {
        if let Some(limiter) = self.limiters.read().unwrap_or_else(PoisonError::into_inner).get(domain) {
            return Ok(Arc::clone(limiter));
        }

        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);

        // Another request may have created it while we waited for the lock
        if let Some(limiter) = limiters.get(domain) {
            return Ok(Arc::clone(limiter));
        }

        let limiter = Arc::new(MemoryLimiter::new(rule.limit, rule.window)?);
        limiters.insert(domain.to_string(), Arc::clone(&limiter));

        Ok(limiter)
    }
}
