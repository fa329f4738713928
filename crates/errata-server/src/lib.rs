#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accounts;
mod context;
mod facade;
mod health;
mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use errata_config::Config;
use errata_core::{CanonicalError, Kind, LogSink};
use tower_http::trace::TraceLayer;

pub use context::{DomainRouter, Principal, REQUEST_ID_HEADER, RequestMeta, client_ip, generate_request_id};
pub use facade::{ApiError, UnifiedErrors};

/// Pin every route of `router` to `domain`, overriding the routing table
pub fn scoped(domain: &'static str, router: Router) -> Router {
    router.layer(axum::middleware::from_fn(move |req, next| {
        middleware::domain_middleware(domain, req, next)
    }))
}

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    errors: Arc<UnifiedErrors>,
}

/// Collects extra routes and a log sink before the middleware is applied
pub struct ServerBuilder {
    config: Config,
    routes: Router,
    sink: Option<Arc<dyn LogSink>>,
}

impl ServerBuilder {
    /// Merge application routes; they share the error middleware
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Send error logs somewhere other than `tracing`
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the server
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent or rate-limiter
    /// construction fails
    pub fn build(self) -> anyhow::Result<Server> {
        let Self { config, routes, sink } = self;

        config.validate()?;

        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mut errors = UnifiedErrors::from_config(&config);
        if let Some(sink) = sink {
            errors = errors.with_sink(sink);
        }
        let errors = Arc::new(errors);
        let router = Arc::new(DomainRouter::from_config(&config.routes()));

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        // Account domain
        app = app.merge(accounts::router(Arc::clone(&errors)));

        // Application routes
        app = app.merge(routes);

        app = app.fallback(|meta: RequestMeta| async move {
            ApiError(CanonicalError::new(Kind::NotFound, "route not found").with_detail("path", meta.path))
        });

        // Apply middleware layers (innermost first)

        // Rate limiting
        if let Some(ref rl_config) = config.rate_limit {
            let limiter = Arc::new(errata_ratelimit::create_registry(rl_config)?);
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let limiter = Arc::clone(&limiter);
                async move { middleware::rate_limit_middleware(limiter, req, next).await }
            }));
        }

        // Error rendering
        let render = Arc::clone(&errors);
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let errors = Arc::clone(&render);
            async move { middleware::error_middleware(errors, req, next).await }
        }));

        // Panic recovery
        let recovery = Arc::clone(&errors);
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let errors = Arc::clone(&recovery);
            async move { middleware::recovery_middleware(errors, req, next).await }
        }));

        // Request logging
        app = app.layer(axum::middleware::from_fn(middleware::logging_middleware));

        // Request context (outermost of ours, everything below reads it)
        app = app.layer(axum::middleware::from_fn(move |req, next| {
            let router = Arc::clone(&router);
            async move { middleware::context_middleware(router, req, next).await }
        }));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        Ok(Server {
            router: app,
            listen_address,
            errors,
        })
    }
}

impl Server {
    pub fn builder(config: Config) -> ServerBuilder {
        ServerBuilder {
            config,
            routes: Router::new(),
            sink: None,
        }
    }

    /// Build the server with only the built-in routes
    ///
    /// # Errors
    ///
    /// See [`ServerBuilder::build`]
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::builder(config).build()
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared error facade, for code outside the router
    pub fn errors(&self) -> Arc<UnifiedErrors> {
        Arc::clone(&self.errors)
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_json() {
        let router = Server::new(Config::default()).unwrap().into_router();
        let (status, headers, body) = send(router, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn invalid_id_is_a_handler_validation_error() {
        let router = Server::new(Config::default()).unwrap().into_router();
        let (status, _, body) = send(router, get("/api/accounts/abc")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!("account_VALIDATION_ERROR"));
        assert_eq!(body["details"]["parameter_name"], json!("id"));
    }

    #[tokio::test]
    async fn unknown_routes_are_system_not_found() {
        let router = Server::new(Config::default()).unwrap().into_router();
        let (status, _, body) = send(router, get("/nowhere")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("system_NOT_FOUND"));
        assert_eq!(body["details"]["path"], json!("/nowhere"));
    }

    #[tokio::test]
    async fn scoped_routes_override_the_routing_table() {
        let routes = scoped(
            "branch",
            Router::new().route(
                "/api/accounts/branches/{id}",
                axum::routing::get(|| async { ApiError(CanonicalError::new(Kind::NotFound, "no such branch")) }),
            ),
        );
        let router = Server::builder(Config::default()).routes(routes).build().unwrap().into_router();

        let (status, _, body) = send(router, get("/api/accounts/branches/9")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("branch_NOT_FOUND"));
    }

    #[tokio::test]
    async fn list_rejects_unknown_sort_field() {
        let router = Server::new(Config::default()).unwrap().into_router();
        let (status, _, body) = send(router, get("/api/accounts?sort_by=password")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["allowed_fields"], json!(["id", "email", "created_at"]));
    }
}
