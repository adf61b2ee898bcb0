//! # Shared Bus - Publish/Subscribe Transport
//!
//! The capability the request engine consumes to talk to a broker.
//!
//! ## Contract
//!
//! A subscription delivers two distinguishable event kinds, each bounded by a
//! caller-supplied wait per `receive` call:
//!
//! ```text
//!   subscribe(topic) ──► Confirmed { topic }            (exactly once, first)
//!                    ──► Message { channel, payload }   (zero or more)
//!                    ──► Unrecognized { kind }          (transport noise)
//! ```
//!
//! Any substitute transport must preserve this two-event contract: the engine
//! publishes a request only after it has observed `Confirmed`.
//!
//! ## Implementations
//!
//! - [`InMemoryBus`]: single-process broker over `tokio::sync::mpsc`
//! - `RedisBus` (feature `redis`): Redis `SUBSCRIBE`/`PUBLISH`

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

#[cfg(feature = "redis")]
pub mod redis_bus;

// Re-export main types
pub use events::BusEvent;
pub use publisher::{BusTransport, InMemoryBus};
pub use subscriber::{BusSubscription, InMemorySubscription, TransportError};

#[cfg(feature = "redis")]
pub use redis_bus::{RedisBus, RedisSubscription};

/// Maximum events to buffer per subscription before messages are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
