//! Gateway service: binds the HTTP listener and serves the router until
//! shutdown.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::router::router;
use axum::Router;
use request_engine::RequestEngine;
use shared_bus::BusTransport;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// HTTP gateway over a bus transport.
pub struct GatewayService<T: BusTransport> {
    config: GatewayConfig,
    engine: RequestEngine<T>,
}

impl<T: BusTransport> GatewayService<T> {
    /// Create the service, validating `config` first.
    pub fn new(config: GatewayConfig, transport: Arc<T>) -> Result<Self, GatewayError> {
        config.validate()?;
        let engine = RequestEngine::with_config(transport, config.engine.clone());
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn engine(&self) -> &RequestEngine<T> {
        &self.engine
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        router(self.engine.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Starting HTTP server");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
