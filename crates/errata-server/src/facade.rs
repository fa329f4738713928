use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use errata_config::Config;
use errata_core::layer::{HandlerLayer, RepositoryLayer, ServiceLayer};
use errata_core::{
    Attributes, BoxError, CanonicalError, ClientPolicy, CodeRegistry, DomainError, ErrorCollection, HttpError, Layer,
    LogLevel, LogSink, Sanitizer, TracingSink, WireSuccess, log_decision,
};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::context::{DomainRouter, REQUEST_ID_HEADER, RequestMeta};

/// Single entry point for surfacing errors over HTTP
///
/// Owns the code registry, the domain routing table, the client policy
/// and the log sink. Cheap to share behind an `Arc`.
pub struct UnifiedErrors {
    registry: CodeRegistry,
    router: DomainRouter,
    policy: ClientPolicy,
    log_client_errors: bool,
    sink: Arc<dyn LogSink>,
}

impl UnifiedErrors {
    pub fn from_config(config: &Config) -> Self {
        Self {
            registry: CodeRegistry::new(config.known_domains()),
            router: DomainRouter::from_config(&config.routes()),
            policy: ClientPolicy {
                include_cause: config.errors.include_cause,
                include_stack_trace: config.errors.include_stack_trace,
                sanitizer: Sanitizer::new(&config.errors.sensitive_fields),
            },
            log_client_errors: config.errors.log_client_errors,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the log sink
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub const fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    pub const fn router(&self) -> &DomainRouter {
        &self.router
    }

    pub const fn policy(&self) -> &ClientPolicy {
        &self.policy
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }
}

// -- layer factories --

#[allow(clippy::unused_self)]
impl UnifiedErrors {
    pub fn handler(&self, domain: &str) -> HandlerLayer {
        HandlerLayer::new(domain)
    }

    pub fn service(&self, domain: &str) -> ServiceLayer {
        ServiceLayer::new(domain)
    }

    pub fn repository(&self, domain: &str) -> RepositoryLayer {
        RepositoryLayer::new(domain)
    }

    pub fn collection(&self, domain: &str) -> ErrorCollection {
        ErrorCollection::new(domain)
    }

    pub fn to_canonical(&self, err: impl Into<BoxError>) -> CanonicalError {
        errata_core::to_canonical(err)
    }
}

// -- responses --

impl UnifiedErrors {
    /// Log and write an error response
    ///
    /// Foreign errors are lifted first. The request's domain fills in a
    /// missing one and the request ID is always stamped.
    pub fn respond(&self, err: impl Into<BoxError>, meta: &RequestMeta) -> Response {
        let err = self.prepare(err, meta);
        self.log(&err, meta);
        self.write(&err, meta)
    }

    /// Write an error response without logging it
    ///
    /// For callers that already logged the failure themselves.
    pub fn render(&self, err: impl Into<BoxError>, meta: &RequestMeta) -> Response {
        let err = self.prepare(err, meta);
        self.write(&err, meta)
    }

    pub fn respond_success<T: Serialize>(&self, data: T, meta: &RequestMeta) -> Response {
        self.success(StatusCode::OK, data, meta)
    }

    pub fn respond_created<T: Serialize>(&self, data: T, meta: &RequestMeta) -> Response {
        self.success(StatusCode::CREATED, data, meta)
    }

    fn success<T: Serialize>(&self, status: StatusCode, data: T, meta: &RequestMeta) -> Response {
        match serde_json::to_vec(&WireSuccess::new(data, meta.domain.as_str())) {
            Ok(body) => json_response(status, body, meta),
            Err(e) => {
                let err = CanonicalError::from(DomainError::system(
                    &meta.domain,
                    "encoder",
                    "respond_success",
                    "Failed to encode response",
                ))
                .with_cause(e);
                self.respond(err, meta)
            }
        }
    }

    fn prepare(&self, err: impl Into<BoxError>, meta: &RequestMeta) -> CanonicalError {
        errata_core::lift(err, &meta.domain, &errata_core::Details::new())
            .or_domain(&meta.domain)
            .or_layer(Layer::Handler)
            .with_request_id(meta.request_id.as_str())
    }

    fn log(&self, err: &CanonicalError, meta: &RequestMeta) {
        let Some(decision) = log_decision(err, self.log_client_errors) else {
            return;
        };

        let mut attributes = self.log_context(err);
        attributes.insert("method".into(), meta.method.clone().into());
        attributes.insert("path".into(), meta.path.clone().into());
        attributes.insert("client_ip".into(), meta.client_ip.clone().into());

        if decision.audit {
            audit_fields(&mut attributes, err, meta);
        }

        self.sink.log(decision.level, decision.message, &attributes);
    }

    /// Operator view of `err` with sensitive details redacted
    fn log_context(&self, err: &CanonicalError) -> Attributes {
        let mut attributes = err.log_context();
        if let Some(Value::Object(details)) = attributes.get_mut("details") {
            self.policy.sanitizer.sanitize(details);
        }
        attributes
    }

    fn write(&self, err: &CanonicalError, meta: &RequestMeta) -> Response {
        if !self.registry.is_known(err.domain()) {
            tracing::debug!(domain = err.domain(), "error surfaced under an unregistered domain");
        }

        match serde_json::to_vec(&err.to_wire(&self.policy)) {
            Ok(body) => json_response(err.status_code(), body, meta),
            Err(e) => {
                let mut attributes = self.log_context(err);
                attributes.insert("encode_error".into(), e.to_string().into());
                self.sink.log(LogLevel::Error, "failed to encode error response", &attributes);

                let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
                set_request_id(&mut response, meta);
                response
            }
        }
    }
}

impl Default for UnifiedErrors {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Security audit fields for authentication failures
fn audit_fields(attributes: &mut Attributes, err: &CanonicalError, meta: &RequestMeta) {
    let email = err
        .detail("email")
        .cloned()
        .or_else(|| meta.email().map(Value::from))
        .unwrap_or(Value::Null);

    attributes.insert("email".into(), email);
    attributes.insert("ip".into(), meta.client_ip.clone().into());
    attributes.insert("step".into(), err.detail("step").cloned().unwrap_or(Value::Null));
}

fn json_response(status: StatusCode, body: Vec<u8>, meta: &RequestMeta) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    set_request_id(&mut response, meta);
    response
}

pub(crate) fn set_request_id(response: &mut Response, meta: &RequestMeta) {
    if let Ok(value) = HeaderValue::from_str(&meta.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}

/// Handler error that the error middleware renders
///
/// Carries the canonical error in the response extensions; the
/// middleware holds the request metadata needed to finish the job.
#[derive(Debug)]
pub struct ApiError(pub CanonicalError);

impl<E: Into<CanonicalError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.0.status_code().into_response();
        response.extensions_mut().insert(self.0);
        response
    }
}
