//! # Request Engine
//!
//! Synchronous request/response over publish/subscribe topics.
//!
//! ## Correlation
//!
//! Each call gets a private reply topic `{destination}:{uuid}`. The engine
//! subscribes to it, publishes the request on `destination` once the broker
//! confirms the subscription, and returns the first message received on the
//! reply topic:
//!
//! ```text
//!   caller ──call(dest, payload)──► engine
//!                                     │ subscribe(dest:uuid)
//!                                     │ ◄── Confirmed
//!                                     │ publish(dest, Message<dest:uuid: payload>)
//!                                     │ ◄── Message { channel: dest:uuid, .. }
//!                                     │ close()
//!   caller ◄──────── reply ───────────┘
//! ```
//!
//! The wait for the confirmation and the wait for the reply each end at a
//! deadline [`EngineConfig::receive_timeout`] away; stray events do not push
//! it back. The reply subscription is closed on every exit path.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod topic;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{EngineConfig, DEFAULT_RECEIVE_TIMEOUT};
pub use engine::{EngineStats, RequestEngine, StatsSnapshot};
pub use envelope::{EnvelopeError, RequestEnvelope};
pub use error::CallError;
pub use topic::{fatal_entropy_failure, ReplyTopic};
