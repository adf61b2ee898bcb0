//! # HTTP Gateway
//!
//! Turns HTTP requests into correlated calls on a publish/subscribe broker.
//!
//! ```text
//!   HTTP client
//!       │  POST /{service}        GET / (Host: h)
//!       ▼
//!   ┌──────────────────────────────────────────┐
//!   │  TracingLayer ─► router                  │
//!   │        │                                 │
//!   │        ▼                                 │
//!   │  RequestEngine::call(topic, payload)     │
//!   └────────┼─────────────────────────────────┘
//!            ▼
//!   broker: {service} / html:h  ◄─► reply topic {topic}:{uuid}
//! ```
//!
//! Successful replies are returned with `200`; any failure to reach a service
//! is answered with `503 Unreachable Service`.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod middleware;
pub mod router;
pub mod service;

pub use domain::config::{BrokerConfig, ConfigError, GatewayConfig, HttpConfig};
pub use domain::error::GatewayError;
pub use domain::payload::{ForwardPayload, UNREACHABLE_SERVICE};
pub use router::{router, AppState};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
