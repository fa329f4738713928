use serde::de::DeserializeOwned;
use serde_json::error::Category;
use serde_json::json;
use strum::{Display, EnumString};

use crate::validate::{Validate, Violations};
use crate::{CanonicalError, Details, DomainError, ErrorCollection, Layer};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
pub const DEFAULT_SORT_FIELD: &str = "created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sorting {
    pub sort_by: String,
    pub order: SortOrder,
}

/// `(current_page, total_pages)` for an offset window, pages counted from 1
pub const fn page_info(total: i64, limit: i64, offset: i64) -> (i64, i64) {
    if limit <= 0 {
        return (1, 0);
    }

    let current_page = offset / limit + 1;
    let mut total_pages = total / limit;
    if total % limit > 0 {
        total_pages += 1;
    }

    (current_page, total_pages)
}

/// Request parsing for one domain
///
/// Every failure is a `VALIDATION_ERROR` or `INVALID_INPUT` stamped with
/// `layer=handler`.
#[derive(Debug, Clone)]
pub struct HandlerLayer {
    domain: String,
}

impl HandlerLayer {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Positive 64-bit identifier from a path or query parameter
    pub fn parse_id(&self, name: &str, raw: Option<&str>) -> Result<i64, CanonicalError> {
        let raw = raw.map(str::trim).unwrap_or_default();

        if raw.is_empty() {
            return Err(self.missing(name, "id"));
        }

        let id: i64 = raw.parse().map_err(|_| {
            self.invalid_parameter(name, format!("Invalid {name} format: must be a valid integer"))
                .with_detail("parameter_value", raw)
                .with_detail("expected_type", "int64")
        })?;

        if id <= 0 {
            return Err(self
                .invalid_parameter(name, format!("Invalid {name}: must be a positive integer"))
                .with_detail("parameter_value", id)
                .with_detail("minimum_value", 1));
        }

        Ok(id)
    }

    /// Trimmed string of at least `min_len` characters with no control characters
    pub fn parse_string(&self, name: &str, raw: Option<&str>, min_len: usize) -> Result<String, CanonicalError> {
        let value = raw.map(str::trim).unwrap_or_default();

        if value.is_empty() {
            return Err(self.missing(name, "string"));
        }

        if value.chars().any(char::is_control) {
            return Err(self.invalid_parameter(name, format!("Parameter {name} contains invalid characters")));
        }

        let length = value.chars().count();
        if length < min_len {
            return Err(self
                .invalid_parameter(name, format!("Parameter {name} must be at least {min_len} characters long"))
                .with_detail("parameter_value", value)
                .with_detail("minimum_length", min_len)
                .with_detail("current_length", length));
        }

        Ok(value.to_owned())
    }

    /// `limit` in `1..=100` (default 10) and `offset >= 0` (default 0)
    pub fn parse_pagination(&self, limit: Option<&str>, offset: Option<&str>) -> Result<Pagination, CanonicalError> {
        let mut pagination = Pagination::default();

        if let Some(raw) = limit.map(str::trim).filter(|raw| !raw.is_empty()) {
            let limit: i64 = raw.parse().map_err(|_| {
                self.invalid_parameter("limit", "Invalid limit parameter: must be a valid integer")
                    .with_detail("parameter_value", raw)
            })?;

            if limit < 1 {
                return Err(self
                    .invalid_parameter("limit", "Invalid limit parameter: must be at least 1")
                    .with_detail("parameter_value", limit)
                    .with_detail("minimum_value", 1));
            }

            if limit > MAX_LIMIT {
                return Err(self
                    .invalid_parameter("limit", format!("Invalid limit parameter: cannot exceed {MAX_LIMIT}"))
                    .with_detail("parameter_value", limit)
                    .with_detail("maximum_value", MAX_LIMIT));
            }

            pagination.limit = limit;
        }

        if let Some(raw) = offset.map(str::trim).filter(|raw| !raw.is_empty()) {
            let offset: i64 = raw.parse().map_err(|_| {
                self.invalid_parameter("offset", "Invalid offset parameter: must be a valid integer")
                    .with_detail("parameter_value", raw)
            })?;

            if offset < 0 {
                return Err(self
                    .invalid_parameter("offset", "Invalid offset parameter: cannot be negative")
                    .with_detail("parameter_value", offset)
                    .with_detail("minimum_value", 0));
            }

            pagination.offset = offset;
        }

        Ok(pagination)
    }

    /// Sort field from an allowlist and direction, both case-insensitive
    ///
    /// An empty allowlist accepts any field.
    pub fn parse_sort(
        &self,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        allowed: &[&str],
    ) -> Result<Sorting, CanonicalError> {
        let sort_by = sort_by
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SORT_FIELD.to_owned());

        let order = match sort_order.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
            None => SortOrder::default(),
            Some(raw) => raw.parse().map_err(|_| {
                self.invalid_parameter("sort_order", "Invalid sort order. Use 'asc' or 'desc'")
                    .with_detail("parameter_value", raw.as_str())
            })?,
        };

        if !allowed.is_empty() && !allowed.contains(&sort_by.as_str()) {
            return Err(self
                .invalid_parameter("sort_by", format!("Invalid sort field. Allowed: {}", allowed.join(", ")))
                .with_detail("parameter_value", sort_by.as_str())
                .with_detail("allowed_fields", allowed.to_vec()));
        }

        Ok(Sorting { sort_by, order })
    }

    /// Decode a JSON body, distinguishing empty, malformed and mis-shaped input
    pub fn decode_json<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CanonicalError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(self.invalid_input("Request body cannot be empty", "empty_body", Details::new()));
        }

        serde_json::from_slice(body).map_err(|err| self.decode_error(err))
    }

    /// Run a payload's own checks and fold every violation into one error
    pub fn validate_struct<T: Validate>(&self, value: &T) -> Result<(), CanonicalError> {
        let mut violations = Violations::new();
        value.validate(&mut violations);

        let mut collection = ErrorCollection::new(self.domain.as_str());
        for violation in violations {
            let err = match violation.value {
                Some(value) => DomainError::validation_with_value(&self.domain, &violation.field, violation.message, value),
                None => DomainError::validation(&self.domain, &violation.field, violation.message),
            };
            collection.add(err);
        }

        collection.into_result().map_err(|err| err.with_layer(Layer::Handler))
    }

    fn decode_error(&self, err: serde_json::Error) -> CanonicalError {
        let mut context = Details::new();
        context.insert("line".into(), err.line().into());
        context.insert("column".into(), err.column().into());

        let (message, error_type) = match err.classify() {
            Category::Syntax | Category::Eof => ("Invalid JSON syntax", "json_syntax"),
            Category::Data => {
                let reason = err.to_string();
                let mismatch = reason.starts_with("invalid type") || reason.starts_with("invalid value");
                context.insert("reason".into(), json!(reason));

                if mismatch {
                    ("Invalid value type in request body", "type_mismatch")
                } else {
                    ("Request body does not match the expected shape", "shape_mismatch")
                }
            }
            Category::Io => ("Invalid JSON format", "json_decode"),
        };

        self.invalid_input(message, error_type, context).with_cause(err)
    }

    fn invalid_input(&self, message: &str, error_type: &str, mut context: Details) -> CanonicalError {
        context.insert("error_type".into(), error_type.into());

        CanonicalError::from(DomainError::invalid_input(&self.domain, message, context)).with_layer(Layer::Handler)
    }

    fn missing(&self, name: &str, parameter_type: &str) -> CanonicalError {
        self.invalid_parameter(name, format!("Missing required parameter: {name}"))
            .with_detail("parameter_type", parameter_type)
    }

    fn invalid_parameter(&self, name: &str, message: impl Into<String>) -> CanonicalError {
        CanonicalError::from(DomainError::validation(&self.domain, name, message))
            .with_layer(Layer::Handler)
            .with_detail("parameter_name", name)
    }
}
