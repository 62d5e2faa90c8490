//! Supervisor configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SupervisorError;

/// When frequency bending is applied on a fresh tune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BendingPolicy {
    /// Enabled once any registered frontend declares `NEEDS_BENDING`
    #[default]
    Auto,
    /// Never bend
    Off,
    /// Always bend
    On,
}

/// Supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Grace period after the last writer closes before the monitor stops (ms).
    /// Zero stops the monitor at its next wake and skips the hardware sleep.
    pub shutdown_timeout_ms: u64,
    /// Floor of the adaptive poll delay (ms)
    pub min_poll_delay_ms: u64,
    /// Poll delay before the first status read (ms)
    pub initial_poll_delay_ms: u64,
    /// Poll delay after a zigzag recovery step (ms)
    pub recovery_poll_delay_ms: u64,
    /// Unlocked time after which `TIMEDOUT` is reported (ms)
    pub lock_timeout_ms: u64,
    /// Event ring capacity per frontend
    pub event_queue_capacity: usize,
    /// Frequency bending policy
    pub frequency_bending: BendingPolicy,
    /// Force spectral inversion to auto on every fresh tune
    pub force_auto_inversion: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 5_000,
            min_poll_delay_ms: 50,
            initial_poll_delay_ms: 3_000,
            recovery_poll_delay_ms: 200,
            lock_timeout_ms: 2_000,
            event_queue_capacity: 8,
            frequency_bending: BendingPolicy::Auto,
            force_auto_inversion: false,
        }
    }
}

impl SupervisorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SupervisorError> {
        let config: SupervisorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SupervisorError> {
        let path = path.as_ref();
        debug!("Loading supervisor config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, SupervisorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the monitor cannot work with
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.event_queue_capacity == 0 {
            return Err(SupervisorError::Config(
                "event_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.min_poll_delay_ms == 0 {
            return Err(SupervisorError::Config(
                "min_poll_delay_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Whether the hardware is put to sleep when the monitor stops
    pub fn sleep_on_close(&self) -> bool {
        self.shutdown_timeout_ms > 0
    }

    pub fn min_poll_delay(&self) -> Duration {
        Duration::from_millis(self.min_poll_delay_ms)
    }

    pub fn initial_poll_delay(&self) -> Duration {
        Duration::from_millis(self.initial_poll_delay_ms)
    }

    pub fn recovery_poll_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_poll_delay_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = SupervisorConfig::from_json(
            r#"{ "shutdown_timeout_ms": 0, "frequency_bending": "on" }"#,
        )
        .unwrap();
        assert_eq!(config.shutdown_timeout_ms, 0);
        assert!(!config.sleep_on_close());
        assert_eq!(config.frequency_bending, BendingPolicy::On);
        assert_eq!(config.event_queue_capacity, 8);
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = SupervisorConfig {
            force_auto_inversion: true,
            ..Default::default()
        };
        let json = config.to_json_pretty().unwrap();
        assert_eq!(SupervisorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SupervisorConfig::from_json(r#"{ "event_queue_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, SupervisorError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SupervisorConfig::load("/nonexistent/fe-supervisor.json").unwrap_err();
        assert!(matches!(err, SupervisorError::Io(_)));
    }
}
