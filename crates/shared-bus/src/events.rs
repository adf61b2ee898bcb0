//! # Bus Events
//!
//! The closed set of signals a subscription can hand to its owner.

use bytes::Bytes;

/// A signal delivered on a subscription.
///
/// Brokers emit more frame types than the engine cares about (pongs,
/// unsubscribe acknowledgements, pattern messages). Adapters map everything
/// they cannot classify to [`BusEvent::Unrecognized`] instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The subscription has taken effect; messages published from now on
    /// will be delivered.
    Confirmed {
        /// Topic the subscription is bound to.
        topic: String,
    },

    /// A payload published on a subscribed channel.
    Message {
        /// Channel the message was published on.
        channel: String,
        /// Opaque message body.
        payload: Bytes,
    },

    /// A transport signal outside the contract.
    Unrecognized {
        /// Broker-specific name of the signal.
        kind: String,
    },
}

impl BusEvent {
    /// Build a data message event.
    pub fn message(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::Message {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Short name of the event kind, for logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Message { .. } => "message",
            Self::Unrecognized { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructor() {
        let event = BusEvent::message("echo:1", "HI");
        assert_eq!(
            event,
            BusEvent::Message {
                channel: "echo:1".to_string(),
                payload: Bytes::from_static(b"HI"),
            }
        );
    }

    #[test]
    fn test_kind_names() {
        let confirmed = BusEvent::Confirmed {
            topic: "t".into(),
        };
        assert_eq!(confirmed.kind(), "confirmed");
        assert_eq!(BusEvent::message("t", "x").kind(), "message");

        let pong = BusEvent::Unrecognized {
            kind: "pong".into(),
        };
        assert_eq!(pong.kind(), "pong");
    }
}
