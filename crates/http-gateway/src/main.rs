//! # HTTP Gateway Binary
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (`RUST_LOG`, default `info`)
//! 2. Load configuration from defaults and environment
//! 3. Connect to the broker and check it answers `PING`
//! 4. Serve HTTP until Ctrl+C

use anyhow::{Context, Result};
use http_gateway::{GatewayConfig, GatewayService};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = GatewayConfig::from_env();
    config.validate().context("invalid gateway configuration")?;

    info!(
        version = http_gateway::VERSION,
        http = %config.http_addr(),
        broker = %config.broker.address,
        receive_timeout_ms = config.engine.receive_timeout.as_millis() as u64,
        "Starting HTTP gateway"
    );

    let transport = connect_broker(&config).await?;
    let service = GatewayService::new(config, transport).context("failed to create gateway")?;

    service
        .serve(shutdown_signal())
        .await
        .context("HTTP gateway failed")?;

    info!("HTTP gateway stopped");
    Ok(())
}

#[cfg(feature = "redis")]
async fn connect_broker(config: &GatewayConfig) -> Result<Arc<shared_bus::RedisBus>> {
    let bus = shared_bus::RedisBus::connect(&config.broker.address)
        .await
        .map_err(|e| http_gateway::GatewayError::Broker(e.to_string()))
        .with_context(|| format!("failed to connect to broker at {}", config.broker.address))?;
    Ok(Arc::new(bus))
}

#[cfg(not(feature = "redis"))]
async fn connect_broker(_config: &GatewayConfig) -> Result<Arc<shared_bus::InMemoryBus>> {
    warn!("Built without the redis feature; serving from an in-process bus");
    Ok(Arc::new(shared_bus::InMemoryBus::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
