use gipbridge_transport::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Consecutive descriptor reassembly failures tolerated before a client is
/// reported as unsupported.
pub const DEFAULT_DESCRIPTOR_FAILURE_LIMIT: u32 = 3;

/// Per-device session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub descriptor_failure_limit: u32,
    /// Log every packet in both directions under the `gipbridge::packets` target.
    pub log_packets: bool,
    /// Whether mappers are created as devices connect.
    pub inputs_enabled: bool,
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            descriptor_failure_limit: DEFAULT_DESCRIPTOR_FAILURE_LIMIT,
            log_packets: false,
            inputs_enabled: true,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.descriptor_failure_limit, 3);
        assert!(config.inputs_enabled);
        assert!(!config.log_packets);
        assert_eq!(config.retry.attempts, 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"log_packets":true}"#).unwrap();
        assert!(config.log_packets);
        assert_eq!(config.descriptor_failure_limit, 3);
    }
}
