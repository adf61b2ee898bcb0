//! Request and response bodies exchanged with services.
//!
//! A forwarded request is published as JSON:
//!
//! ```text
//! {"Body":"<base64 of the raw HTTP body>","Content-Type":"<header or empty>"}
//! ```
//!
//! Service replies travel back to HTTP clients as a JSON string holding the
//! base64 of the reply bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Body returned to clients when a service cannot be reached.
pub const UNREACHABLE_SERVICE: &str = "Unreachable Service";

/// A forwarded HTTP request as published to a service topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardPayload {
    #[serde(rename = "Body", with = "body_serde")]
    pub body: Bytes,

    #[serde(rename = "Content-Type", default)]
    pub content_type: String,
}

impl ForwardPayload {
    pub fn new(content_type: impl Into<String>, body: Bytes) -> Self {
        Self {
            body,
            content_type: content_type.into(),
        }
    }

    /// Serialize for publishing.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Render bytes the way forwarded replies are returned: a JSON string of
/// their base64.
pub fn encode_reply(reply: &[u8]) -> String {
    STANDARD.encode(reply)
}

mod body_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(body).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
