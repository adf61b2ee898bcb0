//! Call outcome errors.
//!
//! Every variant is scoped to the call that produced it: it never terminates
//! the process or another in-flight call.

use shared_bus::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Why a call produced no reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The destination topic was empty or contained the envelope separator.
    #[error("destination topic must be non-empty and must not contain \": \"")]
    InvalidDestination,

    /// The reply subscription could not be opened; nothing was published.
    #[error("failed to subscribe to reply topic {reply_topic}: {source}")]
    SubscribeFailed {
        reply_topic: String,
        #[source]
        source: TransportError,
    },

    /// The subscription was confirmed but the request publish was rejected.
    #[error("failed to publish request to {destination}: {source}")]
    PublishFailed {
        destination: String,
        #[source]
        source: TransportError,
    },

    /// Neither a confirmation nor a reply arrived within the bound.
    #[error("no reply on {reply_topic} within {after:?}")]
    Timeout { reply_topic: String, after: Duration },

    /// The transport produced a signal outside the subscribe/message contract.
    #[error("unrecognized transport signal {kind:?} on {reply_topic}")]
    ProtocolViolation { reply_topic: String, kind: String },

    /// The transport failed while waiting, e.g. the broker went away.
    #[error("receive on {reply_topic} failed: {source}")]
    ReceiveFailed {
        reply_topic: String,
        #[source]
        source: TransportError,
    },

    /// The receive task ended without handing back an outcome.
    #[error("request task ended without an outcome")]
    Abandoned,
}

impl CallError {
    /// Whether the call ended because the wait bound elapsed.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
