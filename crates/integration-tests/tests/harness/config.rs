//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use errata_config::{Config, DomainRateLimit, RateLimitConfig, ServerConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with the built-in domains and routing table
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Limit each client of `domain` to `limit` requests per `window`
    pub fn with_rate_limit(mut self, domain: &str, limit: u32, window: &str) -> Self {
        self.config
            .rate_limit
            .get_or_insert_with(RateLimitConfig::default)
            .domains
            .insert(
                domain.to_owned(),
                DomainRateLimit {
                    limit,
                    window: window.to_owned(),
                },
            );
        self
    }

    /// Render causes into client details
    pub fn with_causes(mut self) -> Self {
        self.config.errors.include_cause = true;
        self
    }

    /// Render stack traces of unclassified failures into client details
    pub fn with_stack_traces(mut self) -> Self {
        self.config.errors.include_stack_trace = true;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
