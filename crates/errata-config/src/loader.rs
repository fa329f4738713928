use std::path::Path;

use errata_core::SYSTEM;

use crate::{Config, RoutingConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion or parsing
    /// fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Expand, deserialize and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_domains()?;
        self.validate_routing()?;
        self.validate_rate_limits()?;
        self.validate_health()?;
        Ok(())
    }

    /// Known domains, always including `system`
    pub fn known_domains(&self) -> impl Iterator<Item = &str> {
        self.errors
            .known_domains
            .iter()
            .map(String::as_str)
            .chain((!self.errors.known_domains.iter().any(|d| d == SYSTEM)).then_some(SYSTEM))
    }

    /// Effective routing table
    ///
    /// A configured table is used as is. Otherwise the built-in table,
    /// minus prefixes whose domain is not known.
    pub fn routes(&self) -> RoutingConfig {
        self.routing
            .clone()
            .unwrap_or_else(|| RoutingConfig::builtin(|domain| self.is_known_domain(domain)))
    }

    fn is_known_domain(&self, domain: &str) -> bool {
        self.known_domains().any(|known| known == domain)
    }

    fn validate_domains(&self) -> anyhow::Result<()> {
        for domain in &self.errors.known_domains {
            if domain.is_empty() || !domain.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
                anyhow::bail!("errors.known_domains: '{domain}' must be lowercase letters and underscores");
            }
        }

        Ok(())
    }

    fn validate_routing(&self) -> anyhow::Result<()> {
        let Some(ref routing) = self.routing else {
            return Ok(());
        };

        for (prefix, domain) in &routing.routes {
            if !prefix.starts_with('/') {
                anyhow::bail!("routing prefix '{prefix}' must start with '/'");
            }

            if !self.is_known_domain(domain) {
                anyhow::bail!("routing prefix '{prefix}' maps to unknown domain '{domain}'");
            }
        }

        Ok(())
    }

    fn validate_rate_limits(&self) -> anyhow::Result<()> {
        let Some(ref rate_limit) = self.rate_limit else {
            return Ok(());
        };

        for (domain, limit) in &rate_limit.domains {
            if !self.is_known_domain(domain) {
                anyhow::bail!("rate_limit.domains.{domain}: unknown domain");
            }

            if limit.limit == 0 {
                anyhow::bail!("rate_limit.domains.{domain}.limit must be greater than 0");
            }

            let window = limit
                .window_duration()
                .map_err(|e| anyhow::anyhow!("rate_limit.domains.{domain}.window: {e}"))?;

            if window.is_zero() {
                anyhow::bail!("rate_limit.domains.{domain}.window must be greater than 0");
            }
        }

        Ok(())
    }

    fn validate_health(&self) -> anyhow::Result<()> {
        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{Config, LogFormat};

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert!(config.server.health.enabled);
        assert_eq!(config.server.health.path, "/health");
        assert!(!config.errors.include_cause);
        assert!(config.rate_limit.is_none());
        assert_eq!(config.routes().routes["/api/accounts"], "account");
        assert_eq!(config.telemetry.format, LogFormat::Text);
        assert!(config.errors.sensitive_fields.iter().any(|f| f == "password"));
    }

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
            [server]
            listen_address = "127.0.0.1:4000"

            [server.health]
            path = "/healthz"

            [errors]
            known_domains = ["account", "billing"]
            include_cause = true
            log_client_errors = true
            sensitive_fields = ["password", "pin"]

            [routing]
            "/api/accounts" = "account"
            "/api/invoices" = "billing"

            [rate_limit.domains.billing]
            limit = 5
            window = "1m"

            [telemetry]
            filter = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen_address.unwrap().port(), 4000);
        assert_eq!(config.routes().routes.len(), 2);
        assert_eq!(config.telemetry.format, LogFormat::Json);

        let billing = &config.rate_limit.unwrap().domains["billing"];
        assert_eq!(billing.window_duration().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn system_is_always_known() {
        let config = Config::parse("[errors]\nknown_domains = [\"account\"]").unwrap();
        assert_eq!(config.known_domains().collect::<Vec<_>>(), ["account", "system"]);
    }

    #[test]
    fn narrowed_domains_narrow_builtin_routes() {
        let config = Config::parse("[errors]\nknown_domains = [\"account\", \"auth\"]").unwrap();
        let routes = config.routes().routes;

        assert_eq!(routes.len(), 2);
        assert_eq!(routes["/api/accounts"], "account");
        assert_eq!(routes["/api/auth"], "auth");
        assert!(!routes.contains_key("/api/admin"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::parse("[errors]\ninclude_causes = true").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn routing_to_unknown_domain_is_rejected() {
        let err = Config::parse("[routing]\n\"/api/invoices\" = \"billing\"").unwrap_err();
        assert!(err.to_string().contains("unknown domain 'billing'"));
    }

    #[test]
    fn rate_limit_rules() {
        let err = Config::parse("[rate_limit.domains.account]\nlimit = 0\nwindow = \"1m\"").unwrap_err();
        assert!(err.to_string().contains("limit must be greater than 0"));

        let err = Config::parse("[rate_limit.domains.account]\nlimit = 3\nwindow = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("window"));

        let err = Config::parse("[rate_limit.domains.nowhere]\nlimit = 3\nwindow = \"1m\"").unwrap_err();
        assert!(err.to_string().contains("unknown domain"));
    }

    #[test]
    fn domains_must_be_lowercase() {
        let err = Config::parse("[errors]\nknown_domains = [\"Account\"]").unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn env_placeholders_are_expanded() {
        temp_env::with_var("ERRATA_TEST_FILTER", Some("trace"), || {
            let config = Config::parse("[telemetry]\nfilter = \"{{ env.ERRATA_TEST_FILTER }}\"").unwrap();
            assert_eq!(config.telemetry.filter, "trace");
        });
    }
}
