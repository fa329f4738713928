//! Test server wrapper that starts errata on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use errata_config::Config;
use errata_server::Server;
use tokio_util::sync::CancellationToken;

use super::sink::CapturingSink;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    logs: CapturingSink,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        Self::start_with_routes(config, Router::new()).await
    }

    /// Start a test server with extra application routes mounted
    pub async fn start_with_routes(config: Config, routes: Router) -> anyhow::Result<Self> {
        let logs = CapturingSink::default();
        let server = Server::builder(config)
            .routes(routes)
            .sink(Arc::new(logs.clone()))
            .build()?;

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(
                listener,
                server.into_router().into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                shutdown_clone.cancelled().await;
            })
            .await
            .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self {
            addr,
            shutdown,
            client,
            logs,
        })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Entries the error facade logged
    pub fn logs(&self) -> &CapturingSink {
        &self.logs
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
