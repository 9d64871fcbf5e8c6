//! Engine and discovery configuration.
//!
//! Durations are written in milliseconds in configuration files:
//!
//! ```yaml
//! timeout_ms: 1000
//! retry_limit: 3
//! ack_window_ms: 50
//! drain_quiet_ms: 100
//! queue_capacity: 32
//! state_retry_limit: 3
//! probe_timeout_as_absent: false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AmpError, AmpResult};

/// Immutable settings for an [`Amplifier`](crate::Amplifier) and its engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmpConfig {
    /// Per-attempt bound on write, echo and reply.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Attempts made when the amplifier answers with an empty line.
    pub retry_limit: u32,

    /// How long a set command waits for a trailing line after its echo.
    #[serde(rename = "ack_window_ms", with = "millis")]
    pub ack_window: Duration,

    /// Silence required before the next command after an abandoned one.
    #[serde(rename = "drain_quiet_ms", with = "millis")]
    pub drain_quiet: Duration,

    /// Requests that may wait for the serializer.
    pub queue_capacity: usize,

    /// Queries made by `Zone::state` before giving up with `UnknownState`.
    pub state_retry_limit: u32,

    /// Count a silent zone as absent during discovery.
    pub probe_timeout_as_absent: bool,
}

impl Default for AmpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            retry_limit: 3,
            ack_window: Duration::from_millis(50),
            drain_quiet: Duration::from_millis(100),
            queue_capacity: 32,
            state_retry_limit: 3,
            probe_timeout_as_absent: false,
        }
    }
}

impl AmpConfig {
    /// Check the settings for values the engine cannot run with.
    pub fn validate(&self) -> AmpResult<()> {
        if self.timeout.is_zero() {
            return Err(AmpError::Config("timeout must be non-zero".into()));
        }
        if self.drain_quiet.is_zero() {
            return Err(AmpError::Config("drain quiet period must be non-zero".into()));
        }
        if self.retry_limit == 0 {
            return Err(AmpError::Config("retry_limit must be at least 1".into()));
        }
        if self.state_retry_limit == 0 {
            return Err(AmpError::Config("state_retry_limit must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(AmpError::Config("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse and validate a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> AmpResult<Self> {
        let config: AmpConfig =
            serde_yaml::from_str(yaml).map_err(|e| AmpError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> AmpResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AmpError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }
}

/// `Duration` as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ms = u64::try_from(value.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AmpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.retry_limit, 3);
        assert!(!config.probe_timeout_as_absent);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AmpConfig::from_yaml_str("timeout_ms: 250\nprobe_timeout_as_absent: true\n")
            .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.probe_timeout_as_absent);
        assert_eq!(config.ack_window, Duration::from_millis(50));
        assert_eq!(config.queue_capacity, 32);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = AmpConfig {
            drain_quiet: Duration::from_millis(20),
            ..AmpConfig::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("drain_quiet_ms: 20"));
        assert_eq!(AmpConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_values() {
        for yaml in [
            "timeout_ms: 0",
            "retry_limit: 0",
            "queue_capacity: 0",
            "state_retry_limit: 0",
            "drain_quiet_ms: 0",
        ] {
            let err = AmpConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, AmpError::Config(_)), "{}", yaml);
        }
    }

    #[test]
    fn test_zero_ack_window_is_allowed() {
        let config = AmpConfig::from_yaml_str("ack_window_ms: 0").unwrap();
        assert!(config.ack_window.is_zero());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = AmpConfig::from_yaml_str("timeout: 5").unwrap_err();
        assert!(matches!(err, AmpError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AmpConfig::from_yaml_file("/nonexistent/amp.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/amp.yaml"));
    }
}
