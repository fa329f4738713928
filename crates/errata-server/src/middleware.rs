use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use errata_core::{Attributes, CanonicalError, DomainError, Kind, Layer, LogLevel, SYSTEM};
use errata_ratelimit::{DomainLimiterRegistry, RateLimitError};
use futures_util::FutureExt;
use http::HeaderValue;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};

use crate::context::{self, DomainRouter, Principal, RequestMeta};
use crate::facade::{ApiError, UnifiedErrors, set_request_id};

/// Attach request metadata and echo the request ID on every response
///
/// Runs outermost. The domain comes from the routing table; an explicit
/// domain layer further in may override it for its routes.
pub async fn context_middleware(router: Arc<DomainRouter>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    let meta = RequestMeta {
        request_id: context::generate_request_id(),
        domain: router.resolve(&path).to_string(),
        method: request.method().to_string(),
        client_ip: context::client_ip(request.headers(), request.extensions()),
        principal: request.extensions().get::<Principal>().cloned(),
        path,
    };

    request.extensions_mut().insert(meta.clone());

    let mut response = next.run(request).await;
    set_request_id(&mut response, &meta);
    response
}

/// Pin every route under this layer to `domain`
///
/// Errors leaving these routes without a domain of their own are stamped
/// with it before the error middleware sees them.
pub async fn domain_middleware(domain: &'static str, mut request: Request, next: Next) -> Response {
    if let Some(meta) = request.extensions_mut().get_mut::<RequestMeta>() {
        domain.clone_into(&mut meta.domain);
    }

    let mut response = next.run(request).await;

    if let Some(err) = response.extensions_mut().remove::<CanonicalError>() {
        response.extensions_mut().insert(err.or_domain(domain));
    }

    response
}

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    if let Some(meta) = request.extensions().get::<RequestMeta>() {
        tracing::debug!(
            method = %meta.method,
            path = %meta.path,
            client_ip = meta.client_ip.as_deref().unwrap_or("unknown"),
            request_id = %meta.request_id,
            domain = %meta.domain,
            "request"
        );
    }

    next.run(request).await
}

/// Turn a panicking handler into a generic `system` 500
///
/// The panic is logged once here with the request metadata; the response
/// itself goes out through [`UnifiedErrors::render`].
pub async fn recovery_middleware(errors: Arc<UnifiedErrors>, request: Request, next: Next) -> Response {
    let meta = request.extensions().get::<RequestMeta>().cloned().unwrap_or_default();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(panic.as_ref());

            let mut attributes = Attributes::new();
            attributes.insert("error".into(), message.into());
            attributes.insert("method".into(), meta.method.clone().into());
            attributes.insert("path".into(), meta.path.clone().into());
            attributes.insert("ip".into(), meta.client_ip.clone().into());
            attributes.insert("request_id".into(), meta.request_id.clone().into());
            attributes.insert("domain".into(), meta.domain.clone().into());
            attributes.insert("layer".into(), "middleware".into());
            errors.sink().log(LogLevel::Error, "panic recovered", &attributes);

            let err = CanonicalError::new(Kind::System, "Internal server error")
                .with_domain(SYSTEM)
                .with_detail("component", "panic_handler")
                .with_layer(Layer::Middleware);

            errors.render(err, &meta)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Render canonical errors left in response extensions by [`ApiError`]
///
/// Headers set on the placeholder response, such as `Retry-After`, survive.
pub async fn error_middleware(errors: Arc<UnifiedErrors>, request: Request, next: Next) -> Response {
    let meta = request.extensions().get::<RequestMeta>().cloned().unwrap_or_default();

    let mut placeholder = next.run(request).await;

    let Some(err) = placeholder.extensions_mut().remove::<CanonicalError>() else {
        return placeholder;
    };

    let mut response = errors.respond(err, &meta);

    for (name, value) in placeholder.headers() {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH && !response.headers().contains_key(name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }

    response
}

/// Per-domain, per-client throttling
///
/// Clients are keyed by IP; requests without one share the `unknown` bucket.
pub async fn rate_limit_middleware(limiter: Arc<DomainLimiterRegistry>, request: Request, next: Next) -> Response {
    let Some(meta) = request.extensions().get::<RequestMeta>().cloned() else {
        return next.run(request).await;
    };

    let client = meta.client_ip.as_deref().unwrap_or("unknown");

    match limiter.check(&meta.domain, client) {
        Ok(()) => next.run(request).await,
        Err(RateLimitError::Exceeded {
            domain,
            retry_after,
            limit,
            window,
        }) => {
            let err = DomainError::rate_limited(
                &domain,
                "request",
                Some(u64::from(limit)),
                Some(format!("{}s", window.as_secs())),
            );

            let mut response = ApiError::from(err).into_response();
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "rate limiter failure");
            let err = DomainError::system(&meta.domain, "rate_limiter", "check", "Rate limiter failure").with_cause(e);
            ApiError::from(err).into_response()
        }
    }
}
