//! Runtime configuration
//!
//! Every field has a default matching the shipped firmware, so an empty
//! YAML document is a valid configuration:
//!
//! ```yaml
//! device_name: EKG-ESP32
//! sample_period_ms: 10
//! peak_threshold: 2450
//! peak_comparator: above
//! classifier_k: 4
//! association_retries: 3
//! queue_capacity: 16
//! queue_timeout_ms: 16
//! stream_tick_ms: 1000
//! telemetry_period_ms: 10000
//! stream_recv_timeout_ms: 100
//! http_user_agent: Somnox-ESP32/0.0
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::DEFAULT_K;
use crate::detector::{Comparator, DEFAULT_PEAK_THRESHOLD, DetectorConfig};
use crate::http::DEFAULT_USER_AGENT;
use crate::{MonitorError, Result};

/// Maximum adapter hostname length.
pub const MAX_DEVICE_NAME_LEN: usize = 32;

/// Monitor runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Hostname of the long-range adapter and advertised device name.
    pub device_name: String,
    pub sample_period_ms: u32,
    pub peak_threshold: u16,
    pub peak_comparator: Comparator,
    pub classifier_k: usize,
    /// Re-association attempts after an unexpected link loss.
    pub association_retries: u32,
    pub queue_capacity: usize,
    pub queue_timeout_ms: u64,
    pub stream_tick_ms: u64,
    pub telemetry_period_ms: u64,
    pub stream_recv_timeout_ms: u64,
    pub http_user_agent: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_name: "EKG-ESP32".to_string(),
            sample_period_ms: 10,
            peak_threshold: DEFAULT_PEAK_THRESHOLD,
            peak_comparator: Comparator::Above,
            classifier_k: DEFAULT_K,
            association_retries: 3,
            queue_capacity: 16,
            queue_timeout_ms: 16,
            stream_tick_ms: 1000,
            telemetry_period_ms: 10_000,
            stream_recv_timeout_ms: 100,
            http_user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: MonitorConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&yaml)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded monitor config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() || self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(MonitorError::config(
                "device_name",
                format!("must be 1..={} bytes, got {}", MAX_DEVICE_NAME_LEN, self.device_name.len()),
            ));
        }
        if self.sample_period_ms == 0 {
            return Err(MonitorError::config("sample_period_ms", "must be non-zero"));
        }
        if self.classifier_k == 0 {
            return Err(MonitorError::config("classifier_k", "must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(MonitorError::config("queue_capacity", "must be non-zero"));
        }
        if self.stream_tick_ms == 0 || self.telemetry_period_ms == 0 {
            return Err(MonitorError::config("tick periods", "must be non-zero"));
        }
        Ok(())
    }

    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig { threshold: self.peak_threshold, comparator: self.peak_comparator }
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.sample_period_ms))
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn stream_tick(&self) -> Duration {
        Duration::from_millis(self.stream_tick_ms)
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }

    pub fn stream_recv_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_recv_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = MonitorConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.detector(), DetectorConfig::default());
        assert_eq!(config.sample_period(), Duration::from_millis(10));
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = "peak_comparator: below\npeak_threshold: 930\nclassifier_k: 5\n";
        let config = MonitorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.peak_comparator, Comparator::Below);
        assert_eq!(config.peak_threshold, 930);
        assert_eq!(config.classifier_k, 5);
        assert_eq!(config.device_name, "EKG-ESP32");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "sample_period_ms: 0",
            "classifier_k: 0",
            "queue_capacity: 0",
            "device_name: ''",
            "device_name: this-hostname-is-far-too-long-for-the-adapter",
            "telemetry_period_ms: 0",
        ] {
            let err = MonitorConfig::from_yaml_str(yaml).unwrap_err();
            assert_eq!(err.kind(), "config", "{yaml}");
        }
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = MonitorConfig::from_yaml_str("peak_threshold: [1, 2").unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn missing_file_has_context() {
        let err = MonitorConfig::from_file("/nonexistent/heartlink.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/heartlink.yaml"));
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = MonitorConfig { association_retries: 7, ..MonitorConfig::default() };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(MonitorConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
