use std::collections::BTreeMap;

use errata_core::domains::{ACCOUNT, ADMIN, AUTH, BRANCH};
use serde::Deserialize;

/// Built-in prefixes, each owned by one of the default domains
pub const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("/api/accounts", ACCOUNT),
    ("/api/auth", AUTH),
    ("/api/admin", ADMIN),
    ("/api/branches", BRANCH),
];

/// Path prefixes mapped to the domain that owns them
///
/// A configured table replaces the built-in one entirely.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RoutingConfig {
    pub routes: BTreeMap<String, String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::builtin(|_| true)
    }
}

impl RoutingConfig {
    /// Built-in table restricted to domains accepted by `known`
    pub fn builtin(known: impl Fn(&str) -> bool) -> Self {
        Self {
            routes: DEFAULT_ROUTES
                .iter()
                .filter(|&&(_, domain)| known(domain))
                .map(|&(prefix, domain)| (prefix.to_string(), domain.to_string()))
                .collect(),
        }
    }
}
