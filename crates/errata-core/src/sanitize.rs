use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::Details;

/// Replacement written over sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Keys redacted when no list is configured
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "jwt_token",
    "refresh_token",
    "api_key",
    "db_password",
    "connection_string",
];

/// Redacts credentials from a details map before it leaves the process
///
/// Three rules apply, recursively through nested objects and arrays:
/// a key on the sensitive list is redacted; a `value` whose sibling `field`
/// names a sensitive key is redacted; any string that looks like a bearer
/// credential is redacted wherever it appears.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    fields: HashSet<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_FIELDS.iter().copied())
    }
}

impl Sanitizer {
    /// Build from a list of key names, matched case-insensitively
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fields: fields.into_iter().map(|f| f.as_ref().to_ascii_lowercase()).collect(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.fields.contains(&key.to_ascii_lowercase())
    }

    pub fn sanitize(&self, details: &mut Details) {
        let names_sensitive_field = details
            .get("field")
            .and_then(Value::as_str)
            .is_some_and(|field| self.is_sensitive(field));

        for (key, value) in details.iter_mut() {
            if self.is_sensitive(key) || (names_sensitive_field && key == "value") {
                if !value.is_null() {
                    *value = Value::String(REDACTED.to_owned());
                }
                continue;
            }

            self.sanitize_value(value);
        }
    }

    fn sanitize_value(&self, value: &mut Value) {
        match value {
            Value::Object(map) => self.sanitize(map),
            Value::Array(items) => items.iter_mut().for_each(|item| self.sanitize_value(item)),
            Value::String(s) if looks_like_credential(s) => *s = REDACTED.to_owned(),
            _ => {}
        }
    }
}

/// JWT-shaped strings and HTTP authorization values
pub fn looks_like_credential(s: &str) -> bool {
    fn jwt() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"^eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").expect("must be valid regex")
        })
    }

    let trimmed = s.trim();
    let lower = trimmed.to_ascii_lowercase();

    lower.starts_with("basic ") || lower.starts_with("bearer ") || jwt().is_match(trimmed)
}
