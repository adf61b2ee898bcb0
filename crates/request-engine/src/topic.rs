//! Reply topic derivation.
//!
//! Every call listens on its own topic, `{destination}:{id}`, where `id` is a
//! random 128-bit value rendered as a hyphenated UUID v4. Topic identity is
//! the correlation key: replies need no request id in their payload.

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use uuid::{Builder, Uuid};

/// Separator between the destination and the per-call id.
pub const REPLY_TOPIC_SEPARATOR: char = ':';

/// Length of the rendered id (UUID 8-4-4-4-12 format).
pub const REPLY_ID_LEN: usize = 36;

/// A per-call reply topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyTopic {
    topic: String,
    id: Uuid,
}

impl ReplyTopic {
    /// Derive a fresh reply topic for a call to `destination`.
    ///
    /// Aborts the process if the OS entropy source fails; see
    /// [`fatal_entropy_failure`].
    pub fn derive(destination: &str) -> Self {
        Self::with_id(destination, random_id())
    }

    /// Build the reply topic for a known id.
    pub fn with_id(destination: &str, id: Uuid) -> Self {
        let topic = format!("{destination}{REPLY_TOPIC_SEPARATOR}{id}");
        Self { topic, id }
    }

    /// The full topic string.
    pub fn as_str(&self) -> &str {
        &self.topic
    }

    /// The destination topic this reply topic was derived from.
    pub fn destination(&self) -> &str {
        let end = self.topic.len() - REPLY_ID_LEN - REPLY_TOPIC_SEPARATOR.len_utf8();
        &self.topic[..end]
    }

    /// The per-call id.
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// Consume into the topic string.
    pub fn into_string(self) -> String {
        self.topic
    }
}

impl fmt::Display for ReplyTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic)
    }
}

impl AsRef<str> for ReplyTopic {
    fn as_ref(&self) -> &str {
        &self.topic
    }
}

fn random_id() -> Uuid {
    let mut bytes = [0u8; 16];
    if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
        fatal_entropy_failure(&e);
    }
    Builder::from_random_bytes(bytes).into_uuid()
}

/// Terminate the process after the OS entropy source failed.
///
/// Without entropy no reply topic can be guaranteed unique, and a colliding
/// topic would hand one caller another caller's reply. This is the only
/// condition in the engine that stops the process rather than failing a call.
pub fn fatal_entropy_failure(error: &dyn fmt::Display) -> ! {
    tracing::error!(error = %error, "OS entropy source failed; cannot derive reply topics");
    std::process::abort()
}
