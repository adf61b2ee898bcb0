//! Request envelope wire format.
//!
//! The message published on a destination topic names the reply topic in its
//! channel field and carries the caller's payload untouched:
//!
//! ```text
//! Message<{reply_topic}: {payload}>
//! ```
//!
//! Responders decode the envelope, handle `payload`, and publish their answer
//! on `reply_topic`.

use crate::topic::{REPLY_ID_LEN, REPLY_TOPIC_SEPARATOR};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// Separator between the reply topic and the payload.
pub const ENVELOPE_SEPARATOR: &str = ": ";

const PREFIX: &[u8] = b"Message<";
const SEPARATOR: &[u8] = ENVELOPE_SEPARATOR.as_bytes();
const SUFFIX: &[u8] = b">";

/// Errors decoding a request envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is not framed as Message<...>")]
    Malformed,

    #[error("envelope carries no reply topic")]
    MissingReplyTopic,

    #[error("reply topic is not valid UTF-8")]
    InvalidReplyTopic,
}

/// A request as published to a destination topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Topic the responder must publish its reply on.
    pub reply_to: String,
    /// The caller's request payload.
    pub payload: Bytes,
}

impl RequestEnvelope {
    pub fn new(reply_to: impl Into<String>, payload: Bytes) -> Self {
        Self {
            reply_to: reply_to.into(),
            payload,
        }
    }

    /// Render the envelope for publishing.
    pub fn encode(&self) -> Bytes {
        let mut wire = Vec::with_capacity(
            PREFIX.len() + self.reply_to.len() + SEPARATOR.len() + self.payload.len() + SUFFIX.len(),
        );
        wire.extend_from_slice(PREFIX);
        wire.extend_from_slice(self.reply_to.as_bytes());
        wire.extend_from_slice(SEPARATOR);
        wire.extend_from_slice(&self.payload);
        wire.extend_from_slice(SUFFIX);
        Bytes::from(wire)
    }

    /// Parse an envelope received on a destination topic.
    ///
    /// The reply topic ends at the first `": "` that follows a `:{uuid}`
    /// suffix, or at the first `": "` when no such suffix exists. The payload
    /// may contain anything, including further separators.
    pub fn decode(wire: &[u8]) -> Result<Self, EnvelopeError> {
        let inner = wire
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or(EnvelopeError::Malformed)?;

        let split = reply_topic_end(inner).ok_or(EnvelopeError::MissingReplyTopic)?;

        let reply_to =
            std::str::from_utf8(&inner[..split]).map_err(|_| EnvelopeError::InvalidReplyTopic)?;
        if reply_to.is_empty() {
            return Err(EnvelopeError::MissingReplyTopic);
        }

        Ok(Self {
            reply_to: reply_to.to_string(),
            payload: Bytes::copy_from_slice(&inner[split + SEPARATOR.len()..]),
        })
    }
}

fn reply_topic_end(inner: &[u8]) -> Option<usize> {
    let separators: Vec<usize> = inner
        .windows(SEPARATOR.len())
        .enumerate()
        .filter_map(|(i, window)| (window == SEPARATOR).then_some(i))
        .collect();

    separators
        .iter()
        .copied()
        .find(|&end| ends_with_reply_id(&inner[..end]))
        .or_else(|| separators.first().copied())
}

/// Whether `topic` ends in `:{uuid}`.
fn ends_with_reply_id(topic: &[u8]) -> bool {
    let Some(id_start) = topic.len().checked_sub(REPLY_ID_LEN) else {
        return false;
    };
    let Some(sep) = id_start.checked_sub(1) else {
        return false;
    };
    topic[sep] == REPLY_TOPIC_SEPARATOR as u8
        && std::str::from_utf8(&topic[id_start..])
            .ok()
            .and_then(|id| Uuid::parse_str(id).ok())
            .is_some()
}
