use std::collections::{BTreeSet, HashMap};

use strum::IntoEnumIterator;

use crate::Kind;

/// Domain every deployment knows about, used when nothing more specific applies
pub const SYSTEM: &str = "system";

/// Domains registered when no configuration overrides them
pub const DEFAULT_DOMAINS: &[&str] = &["account", "auth", "admin", "branch", SYSTEM];

/// Build the wire code for a kind in a domain
///
/// `<KIND>` for the empty domain, `<domain>_<KIND>` otherwise.
pub fn code_for(kind: Kind, domain: &str) -> String {
    if domain.is_empty() {
        kind.as_str().to_owned()
    } else {
        format!("{domain}_{}", kind.as_str())
    }
}

/// Frozen set of known domains used to parse codes back apart
///
/// Only registered prefixes are recognised, so a code built from an
/// arbitrary resource name never reads as a domain.
#[derive(Debug, Clone)]
pub struct CodeRegistry {
    domains: BTreeSet<String>,
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAINS.iter().copied())
    }
}

impl CodeRegistry {
    /// Create a registry from a set of domain names
    ///
    /// `system` is always registered.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut domains: BTreeSet<String> = domains.into_iter().map(Into::into).collect();
        domains.insert(SYSTEM.to_owned());

        Self { domains }
    }

    pub fn is_known(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Wire code for a kind in a domain
    pub fn code_for(&self, kind: Kind, domain: &str) -> String {
        code_for(kind, domain)
    }

    /// Domain prefix of a code, or empty when the prefix is not a known domain
    pub fn extract_domain<'a>(&self, code: &'a str) -> &'a str {
        self.split(code).map_or("", |(domain, _)| domain)
    }

    /// Kind half of a code
    ///
    /// Falls back to parsing the whole code when no known domain prefix is present.
    pub fn extract_kind(&self, code: &str) -> Option<Kind> {
        match self.split(code) {
            Some((_, kind)) => Some(kind),
            None => Kind::parse(code),
        }
    }

    /// Whether a code is generic or carries exactly this domain
    pub fn is_code_for(&self, code: &str, domain: &str) -> bool {
        let prefix = self.extract_domain(code);
        prefix.is_empty() || prefix == domain
    }

    /// Every code a domain can emit, keyed by kind
    pub fn domain_codes(&self, domain: &str) -> HashMap<Kind, String> {
        Kind::iter().map(|kind| (kind, code_for(kind, domain))).collect()
    }

    // Longest known domain whose remainder is a valid kind
    fn split<'a>(&self, code: &'a str) -> Option<(&'a str, Kind)> {
        self.domains
            .iter()
            .filter_map(|domain| {
                let rest = code.strip_prefix(domain.as_str())?.strip_prefix('_')?;
                let kind = Kind::parse(rest)?;
                Some((&code[..domain.len()], kind))
            })
            .max_by_key(|(domain, _)| domain.len())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn code_without_domain_is_bare_kind() {
        assert_eq!(code_for(Kind::NotFound, ""), "NOT_FOUND");
        assert_eq!(code_for(Kind::NotFound, "account"), "account_NOT_FOUND");
    }

    #[test]
    fn extract_domain_requires_known_prefix() {
        let registry = CodeRegistry::default();

        assert_eq!(registry.extract_domain("account_NOT_FOUND"), "account");
        assert_eq!(registry.extract_domain("user_profile_NOT_FOUND"), "");
        assert_eq!(registry.extract_domain("VALIDATION_ERROR"), "");
        assert_eq!(registry.extract_domain("account_BOGUS"), "");
    }

    #[test]
    fn extract_kind_falls_back_to_whole_code() {
        let registry = CodeRegistry::default();

        assert_eq!(registry.extract_kind("auth_AUTHENTICATION_ERROR"), Some(Kind::Authentication));
        assert_eq!(registry.extract_kind("RATE_LIMIT"), Some(Kind::RateLimit));
        assert_eq!(registry.extract_kind("nonsense"), None);
    }

    #[test]
    fn is_code_for_accepts_generic_codes() {
        let registry = CodeRegistry::default();

        assert!(registry.is_code_for("TIMEOUT", "account"));
        assert!(registry.is_code_for("account_TIMEOUT", "account"));
        assert!(!registry.is_code_for("branch_TIMEOUT", "account"));
    }

    #[test]
    fn system_is_always_known() {
        let registry = CodeRegistry::new(["billing"]);

        assert!(registry.is_known("system"));
        assert!(registry.is_known("billing"));
        assert!(!registry.is_known("account"));
    }

    #[test]
    fn underscored_domains_parse() {
        let registry = CodeRegistry::new(["user_profile"]);

        assert_eq!(registry.extract_domain("user_profile_DUPLICATE"), "user_profile");
        assert_eq!(registry.extract_kind("user_profile_DUPLICATE"), Some(Kind::Duplicate));
    }

    #[test]
    fn domain_codes_covers_every_kind() {
        let registry = CodeRegistry::default();
        let codes = registry.domain_codes("branch");

        assert_eq!(codes.len(), Kind::iter().count());
        assert_eq!(codes[&Kind::Conflict], "branch_CONFLICT");
    }

    fn any_kind() -> impl Strategy<Value = Kind> {
        proptest::sample::select(Kind::iter().collect::<Vec<_>>())
    }

    fn any_domain() -> impl Strategy<Value = &'static str> {
        proptest::sample::select(DEFAULT_DOMAINS.to_vec())
    }

    proptest! {
        #[test]
        fn codes_parse_back(kind in any_kind(), domain in any_domain()) {
            let registry = CodeRegistry::default();
            let code = code_for(kind, domain);

            prop_assert_eq!(registry.extract_kind(&code), Some(kind));
            prop_assert_eq!(registry.extract_domain(&code), domain);
        }

        #[test]
        fn bare_codes_parse_back(kind in any_kind()) {
            let registry = CodeRegistry::default();
            let code = code_for(kind, "");

            prop_assert_eq!(registry.extract_kind(&code), Some(kind));
            prop_assert_eq!(registry.extract_domain(&code), "");
        }
    }
}
