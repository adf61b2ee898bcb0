//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on each receive attempt.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Request engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long to wait for the subscription confirmation, and again for
    /// the reply once the request is published.
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

impl EngineConfig {
    pub fn with_receive_timeout(receive_timeout: Duration) -> Self {
        Self { receive_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(EngineConfig::default().receive_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: EngineConfig = serde_json::from_str(r#"{"receive_timeout":"250ms"}"#).unwrap();
        assert_eq!(config.receive_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_deserialize_missing_fields_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
