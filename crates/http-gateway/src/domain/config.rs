//! Gateway configuration with validation.
//!
//! Defaults match a single-host deployment: HTTP on port 80 and a Redis
//! broker reachable on the private network. Environment variables override
//! individual fields at startup.

use request_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

/// Broker address override.
pub const ENV_BROKER_ADDRESS: &str = "REDIS";
/// HTTP port override.
pub const ENV_HTTP_PORT: &str = "GATEWAY_HTTP_PORT";
/// Receive timeout override, in milliseconds.
pub const ENV_RECEIVE_TIMEOUT_MS: &str = "GATEWAY_RECEIVE_TIMEOUT_MS";

/// Broker used when `REDIS` is unset.
pub const DEFAULT_BROKER_ADDRESS: &str = "192.168.1.8:6379";

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Broker connection
    pub broker: BrokerConfig,
    /// Request engine tuning
    pub engine: EngineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            broker: BrokerConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(address) = lookup(ENV_BROKER_ADDRESS) {
            info!(address = %address, "Broker address from environment");
            config.broker.address = address;
        }

        if let Some(port) = lookup(ENV_HTTP_PORT) {
            match port.parse() {
                Ok(p) => config.http.port = p,
                Err(e) => warn!(value = %port, error = %e, "Ignoring {}", ENV_HTTP_PORT),
            }
        }

        if let Some(millis) = lookup(ENV_RECEIVE_TIMEOUT_MS) {
            match millis.parse() {
                Ok(ms) => config.engine.receive_timeout = Duration::from_millis(ms),
                Err(e) => warn!(value = %millis, error = %e, "Ignoring {}", ENV_RECEIVE_TIMEOUT_MS),
            }
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.broker.address.trim().is_empty() {
            return Err(ConfigError::MissingBrokerAddress);
        }

        if self.engine.receive_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "receive_timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 80)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 80,
        }
    }
}

/// Broker connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// `host:port` or a full `redis://` URL
    pub address: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("HTTP port cannot be 0")]
    InvalidPort,
    #[error("broker address is empty")]
    MissingBrokerAddress,
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
