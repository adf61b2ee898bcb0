//! Gateway startup errors.
//!
//! Per-request failures never surface here: they are mapped to HTTP
//! responses by the router.

use thiserror::Error;

/// Errors that stop the gateway from serving.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// The HTTP server exited with an error
    #[error("server error: {0}")]
    Serve(String),

    /// The broker could not be reached at startup
    #[error("broker error: {0}")]
    Broker(String),
}

impl From<super::config::ConfigError> for GatewayError {
    fn from(e: super::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
