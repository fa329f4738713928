use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use jiff::Timestamp;
use serde::{Serialize, Serializer};
use serde_json::Value;
use strum::{AsRefStr, Display};

use crate::log::Attributes;
use crate::wire::{ClientPolicy, WireError};
use crate::{Kind, code_for};

/// Free-form key/value bag surfaced to clients as `details`
pub type Details = serde_json::Map<String, Value>;

/// Any error that can cross a thread boundary
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared, clonable cause
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Longest cause chain kept on an error; deeper chains are flattened into text
pub const MAX_CAUSE_DEPTH: usize = 8;

/// Architectural tier that produced or last enriched an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Layer {
    Handler,
    Service,
    Repository,
    Middleware,
}

/// The single in-process failure value
///
/// Enrichment goes through the `with_*` builders, each of which consumes and
/// returns the same error. The wire code is derived from kind and domain on
/// demand so it can never disagree with them.
#[derive(Debug, Clone)]
pub struct CanonicalError {
    kind: Kind,
    message: String,
    status: StatusCode,
    status_overridden: bool,
    details: Details,
    domain: String,
    layer: Option<Layer>,
    operation: Option<String>,
    cause: Option<Cause>,
    retryable: bool,
    timestamp: Timestamp,
    request_id: Option<String>,
    backtrace: Option<Arc<Backtrace>>,
}

impl CanonicalError {
    /// Create an error with the kind's default status and retryability
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();

        Self {
            kind,
            message: message.into(),
            status: kind.status_for(retryable),
            status_overridden: false,
            details: Details::new(),
            domain: String::new(),
            layer: None,
            operation: None,
            cause: None,
            retryable,
            timestamp: Timestamp::now(),
            request_id: None,
            backtrace: None,
        }
    }

    // -- accessors --

    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// Wire code, `<domain>_<KIND>` or `<KIND>`
    pub fn code(&self) -> String {
        code_for(self.kind, &self.domain)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn details(&self) -> &Details {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub const fn layer(&self) -> Option<Layer> {
        self.layer
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    // -- builders --

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the domain only when none has been assigned yet
    pub fn or_domain(self, domain: &str) -> Self {
        if self.domain.is_empty() {
            self.with_domain(domain)
        } else {
            self
        }
    }

    pub const fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Stamp a layer only when none has been recorded
    pub const fn or_layer(mut self, layer: Layer) -> Self {
        if self.layer.is_none() {
            self.layer = Some(layer);
        }
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Merge a details map, later keys overwriting earlier ones
    pub fn with_details(mut self, details: Details) -> Self {
        self.details.extend(details);
        self
    }

    /// Attach the underlying failure
    ///
    /// A canonical error passed here is collapsed into a plain summary so
    /// canonical errors never nest, and chains deeper than
    /// [`MAX_CAUSE_DEPTH`] are flattened into text.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(normalize_cause(cause.into()));
        self
    }

    pub(crate) fn with_shared_cause(mut self, cause: Option<Cause>) -> Self {
        if cause.is_some() {
            self.cause = cause;
        }
        self
    }

    /// Mark retryability
    ///
    /// For `EXTERNAL_SERVICE_ERROR` this also moves the status between 502
    /// and 503 unless the status was explicitly overridden.
    pub const fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        if !self.status_overridden {
            self.status = self.kind.status_for(retryable);
        }
        self
    }

    /// Override the kind's default status
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self.status_overridden = true;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub const fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Capture the current stack, honoring `RUST_BACKTRACE`
    pub fn with_backtrace(mut self) -> Self {
        self.backtrace = Some(Arc::new(Backtrace::capture()));
        self
    }

    // -- projections --

    /// Every internal field, for operators
    ///
    /// Unlike the client shape this includes status, layer, operation and the
    /// rendered cause chain.
    pub fn log_context(&self) -> Attributes {
        let mut attributes = Attributes::new();

        attributes.insert("error_code".into(), self.code().into());
        attributes.insert("error_message".into(), self.message.clone().into());
        attributes.insert("http_status".into(), self.status.as_u16().into());
        attributes.insert("domain".into(), self.domain.clone().into());
        attributes.insert(
            "layer".into(),
            self.layer.map_or(Value::Null, |layer| layer.as_ref().into()),
        );
        attributes.insert("operation".into(), self.operation.clone().into());
        attributes.insert("retryable".into(), self.retryable.into());
        attributes.insert("timestamp".into(), self.timestamp.to_string().into());
        attributes.insert("request_id".into(), self.request_id.clone().into());

        if !self.details.is_empty() {
            attributes.insert("details".into(), Value::Object(self.details.clone()));
        }

        if let Some(cause) = self.cause() {
            attributes.insert("cause".into(), render_chain(cause).into());
        }

        attributes
    }

    /// Message safe to show a client
    ///
    /// Server-side failures never expose their message; external service
    /// failures name the service and nothing else.
    pub fn client_message(&self) -> String {
        if !self.status.is_server_error() {
            return self.message.clone();
        }

        if self.kind == Kind::ExternalService {
            let service = self.details.get("service").and_then(Value::as_str).unwrap_or("upstream");
            return format!("External service error: {service}");
        }

        if self.status == StatusCode::SERVICE_UNAVAILABLE {
            "Service temporarily unavailable".to_owned()
        } else {
            "Internal server error".to_owned()
        }
    }

    /// Client wire shape under a surfacing policy
    pub fn to_wire(&self, policy: &ClientPolicy) -> WireError {
        let mut details = self.details.clone();

        if self.retryable
            || matches!(self.status, StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT)
        {
            details.insert("retryable".into(), Value::Bool(true));
        }

        if policy.include_cause
            && let Some(cause) = self.cause()
        {
            details.insert("cause".into(), render_chain(cause).into());
        }

        if policy.include_stack_trace
            && let Some(backtrace) = self.backtrace()
        {
            details.insert("stack_trace".into(), backtrace.to_string().into());
        }

        policy.sanitizer.sanitize(&mut details);

        WireError {
            code: self.code(),
            message: self.client_message(),
            details,
            domain: (!self.domain.is_empty()).then(|| self.domain.clone()),
            request_id: self.request_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl StdError for CanonicalError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Serializes the client shape under the production policy
impl Serialize for CanonicalError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire(&ClientPolicy::default()).serialize(serializer)
    }
}

impl crate::HttpError for CanonicalError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_type(&self) -> String {
        self.code()
    }

    fn client_message(&self) -> String {
        Self::client_message(self)
    }
}

/// Render an error and its sources as `outer: inner: innermost`
pub fn render_chain(err: &(dyn StdError + 'static)) -> String {
    std::iter::successors(Some(err), |&e| e.source())
        .take(MAX_CAUSE_DEPTH + 1)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

pub(crate) fn normalize_cause(cause: BoxError) -> Cause {
    let cause: BoxError = match cause.downcast::<CanonicalError>() {
        Ok(inner) => Box::new(Collapsed::from(*inner)),
        Err(other) => other,
    };

    let depth = std::iter::successors(Some(&*cause as &(dyn StdError + 'static)), |&e| e.source())
        .take(MAX_CAUSE_DEPTH + 1)
        .count();

    if depth > MAX_CAUSE_DEPTH {
        Arc::new(Truncated(render_chain(&*cause)))
    } else {
        Arc::from(cause)
    }
}

/// A canonical error demoted to a plain cause
#[derive(Debug)]
struct Collapsed {
    summary: String,
    source: Option<Cause>,
}

impl From<CanonicalError> for Collapsed {
    fn from(err: CanonicalError) -> Self {
        Self {
            summary: err.to_string(),
            source: err.cause,
        }
    }
}

impl fmt::Display for Collapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

impl StdError for Collapsed {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Chain that exceeded the depth limit, kept as text
#[derive(Debug)]
struct Truncated(String);

impl fmt::Display for Truncated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (truncated)", self.0)
    }
}

impl StdError for Truncated {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Link {
        depth: usize,
        next: Option<Box<Link>>,
    }

    impl Link {
        fn chain(length: usize) -> Self {
            (1..length).fold(Self { depth: length, next: None }, |next, depth| Self {
                depth: length - depth,
                next: Some(Box::new(next)),
            })
        }
    }

    impl fmt::Display for Link {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "link {}", self.depth)
        }
    }

    impl StdError for Link {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.next.as_deref().map(|next| next as &(dyn StdError + 'static))
        }
    }

    fn chain_len(err: &CanonicalError) -> usize {
        std::iter::successors(err.source(), |&e| e.source()).count()
    }

    #[test]
    fn defaults_follow_kind() {
        let err = CanonicalError::new(Kind::Timeout, "slow");

        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(err.retryable());
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn code_tracks_domain() {
        let err = CanonicalError::new(Kind::NotFound, "missing").with_domain("branch");
        assert_eq!(err.code(), "branch_NOT_FOUND");

        let err = err.or_domain("account");
        assert_eq!(err.domain(), "branch");
    }

    #[test]
    fn external_service_status_moves_with_retryable() {
        let err = CanonicalError::new(Kind::ExternalService, "down");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = err.with_retryable(true);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = err.with_status(StatusCode::GATEWAY_TIMEOUT).with_retryable(false);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn canonical_causes_are_collapsed() {
        let inner = CanonicalError::new(Kind::NotFound, "user with ID 1 not found")
            .with_domain("account")
            .with_cause(std::io::Error::other("no rows"));

        let outer = CanonicalError::new(Kind::Authentication, "Authentication failed").with_cause(inner);

        let cause = outer.cause().unwrap();
        assert!(cause.downcast_ref::<CanonicalError>().is_none());
        assert_eq!(
            render_chain(outer.source().unwrap()),
            "[account_NOT_FOUND] user with ID 1 not found: no rows"
        );
    }

    #[test]
    fn deep_chains_are_truncated() {
        let err = CanonicalError::new(Kind::System, "boom").with_cause(Link::chain(20));

        assert_eq!(chain_len(&err), 1);
        assert!(err.cause().unwrap().to_string().ends_with("(truncated)"));
    }

    #[test]
    fn shallow_chains_are_kept() {
        let err = CanonicalError::new(Kind::System, "boom").with_cause(Link::chain(MAX_CAUSE_DEPTH));

        assert_eq!(chain_len(&err), MAX_CAUSE_DEPTH);
    }

    #[test]
    fn log_context_carries_internals() {
        let err = CanonicalError::new(Kind::System, "db exploded")
            .with_domain("account")
            .with_layer(Layer::Repository)
            .with_operation("create_user")
            .with_cause(std::io::Error::other("disk full"));

        let context = err.log_context();

        assert_eq!(context["error_code"], json!("account_SYSTEM_ERROR"));
        assert_eq!(context["http_status"], json!(500));
        assert_eq!(context["layer"], json!("repository"));
        assert_eq!(context["operation"], json!("create_user"));
        assert_eq!(context["cause"], json!("disk full"));
    }

    #[test]
    fn client_shape_hides_internals() {
        let err = CanonicalError::new(Kind::System, "db exploded")
            .with_domain("account")
            .with_layer(Layer::Repository)
            .with_operation("create_user")
            .with_cause(std::io::Error::other("disk full"));

        let value = serde_json::to_value(&err).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object["message"], json!("Internal server error"));
        assert!(!object.contains_key("layer"));
        assert!(!object.contains_key("operation"));
        assert!(!object.contains_key("cause"));
        assert!(!object.contains_key("http_status"));
        assert!(!object.contains_key("details"));
        assert!(!object.contains_key("request_id"));
    }

    #[test]
    fn retryable_client_errors_advertise_it() {
        let err = CanonicalError::new(Kind::RateLimit, "slow down").with_domain("auth");
        let wire = err.to_wire(&ClientPolicy::default());

        assert_eq!(wire.details["retryable"], json!(true));
        assert_eq!(wire.message, "slow down");
    }

    #[test]
    fn external_service_message_names_service() {
        let err = CanonicalError::new(Kind::ExternalService, "payment gateway refused")
            .with_detail("service", "payments")
            .with_retryable(true);

        assert_eq!(err.client_message(), "External service error: payments");
    }

    #[test]
    fn unavailable_message_is_generic() {
        let err = CanonicalError::new(Kind::ServiceUnavailable, "pool exhausted");
        assert_eq!(err.client_message(), "Service temporarily unavailable");
    }

    #[test]
    fn cause_surfaces_only_when_enabled() {
        let err = CanonicalError::new(Kind::Validation, "bad").with_cause(std::io::Error::other("parse failure"));

        let production = err.to_wire(&ClientPolicy::default());
        assert!(!production.details.contains_key("cause"));

        let debug = err.to_wire(&ClientPolicy {
            include_cause: true,
            ..ClientPolicy::default()
        });
        assert_eq!(debug.details["cause"], json!("parse failure"));
    }
}
