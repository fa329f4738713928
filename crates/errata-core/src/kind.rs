use http::StatusCode;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Closed set of failure categories
///
/// The string form is the `<KIND>` half of every wire code. Adding a variant
/// changes the wire contract; adding a domain does not.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum Kind {
    #[strum(serialize = "NOT_FOUND")]
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[strum(serialize = "VALIDATION_ERROR")]
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[strum(serialize = "DUPLICATE")]
    #[serde(rename = "DUPLICATE")]
    Duplicate,
    #[strum(serialize = "AUTHENTICATION_ERROR")]
    #[serde(rename = "AUTHENTICATION_ERROR")]
    Authentication,
    #[strum(serialize = "AUTHORIZATION_ERROR")]
    #[serde(rename = "AUTHORIZATION_ERROR")]
    Authorization,
    #[strum(serialize = "BUSINESS_LOGIC_ERROR")]
    #[serde(rename = "BUSINESS_LOGIC_ERROR")]
    BusinessLogic,
    #[strum(serialize = "EXTERNAL_SERVICE_ERROR")]
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalService,
    #[strum(serialize = "SERVICE_UNAVAILABLE")]
    #[serde(rename = "SERVICE_UNAVAILABLE")]
    ServiceUnavailable,
    #[strum(serialize = "SYSTEM_ERROR")]
    #[serde(rename = "SYSTEM_ERROR")]
    System,
    #[strum(serialize = "INVALID_INPUT")]
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    #[strum(serialize = "RATE_LIMIT")]
    #[serde(rename = "RATE_LIMIT")]
    RateLimit,
    #[strum(serialize = "TIMEOUT")]
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[strum(serialize = "CONFLICT")]
    #[serde(rename = "CONFLICT")]
    Conflict,
    #[strum(serialize = "DATABASE")]
    #[serde(rename = "DATABASE")]
    Database,
}

impl Kind {
    /// Wire form, e.g. `NOT_FOUND`
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Parse the wire form back into a kind
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Status used when nothing overrides it
    ///
    /// `EXTERNAL_SERVICE_ERROR` is the only kind whose status depends on
    /// retryability, see [`Kind::status_for`].
    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation | Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Duplicate | Self::Conflict => StatusCode::CONFLICT,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::BusinessLogic => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::ExternalService => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::System | Self::Database => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status for a given retryability
    pub const fn status_for(self, retryable: bool) -> StatusCode {
        match self {
            Self::ExternalService if retryable => StatusCode::SERVICE_UNAVAILABLE,
            other => other.default_status(),
        }
    }

    pub const fn default_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::ServiceUnavailable)
    }
}
