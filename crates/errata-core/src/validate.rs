use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// One failed field check
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
    /// Offending value, when it is safe and useful to echo back
    pub value: Option<Value>,
}

/// Accumulates violations while a value validates itself
#[derive(Debug, Clone, Default)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>, value: Option<Value>) {
        self.items.push(FieldViolation {
            field: field.to_owned(),
            message: message.into(),
            value,
        });
    }

    /// Non-blank string
    pub fn required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.push(field, format!("{field} is required"), None);
            return false;
        }
        true
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> bool {
        if value.chars().count() < min {
            self.push(field, format!("{field} must be at least {min} characters"), Some(value.into()));
            return false;
        }
        true
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> bool {
        if value.chars().count() > max {
            self.push(field, format!("{field} cannot exceed {max} characters"), None);
            return false;
        }
        true
    }

    pub fn email(&mut self, field: &str, value: &str) -> bool {
        if !is_valid_email(value) {
            self.push(field, format!("{field} must be a valid email"), Some(value.into()));
            return false;
        }
        true
    }

    /// Password strength; the value is never echoed back
    pub fn password(&mut self, field: &str, value: &str) -> bool {
        let message = if !password_requirements_missing(value).is_empty() {
            format!("{field} must contain uppercase, lowercase, number, and special character")
        } else if value.chars().count() < PASSWORD_MIN_LEN {
            format!("{field} must be at least {PASSWORD_MIN_LEN} characters")
        } else if value.chars().count() > PASSWORD_MAX_LEN {
            format!("{field} cannot exceed {PASSWORD_MAX_LEN} characters")
        } else {
            return true;
        };

        self.push(field, message, None);
        false
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl IntoIterator for Violations {
    type Item = FieldViolation;
    type IntoIter = std::vec::IntoIter<FieldViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Request payloads implement this to check their own fields
pub trait Validate {
    fn validate(&self, violations: &mut Violations);
}

/// Syntax plus RFC 5321 length limits
pub fn is_valid_email(email: &str) -> bool {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9\-]+(\.[a-zA-Z0-9\-]+)*\.[a-zA-Z]+$").expect("must be valid regex")
        })
    }

    if email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    local.len() <= 64 && domain.len() <= 253 && re().is_match(email)
}

/// Character classes a password is missing
pub fn password_requirements_missing(password: &str) -> Vec<&'static str> {
    let mut missing = Vec::new();

    if !password.chars().any(char::is_uppercase) {
        missing.push("uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        missing.push("lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("number");
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        missing.push("special character");
    }

    missing
}
