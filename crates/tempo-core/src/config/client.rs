//! Game client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::{ConfigError, InputError};
use crate::types::{duration_from_secs, TimeControl};

/// Configuration for the game client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the engine service
    pub server_url: String,

    /// Starting time per side, in minutes
    pub minutes: f64,

    /// Increment per move, in seconds
    pub increment_secs: f64,

    /// Clock tick period
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Keep-alive ping period
    #[serde(with = "duration_secs")]
    pub keepalive_interval: Duration,

    /// Pause between a human move and the engine request
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Per-request timeout for engine service calls
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Retry policy for starting a session
    pub start_backoff: BackoffConfig,

    /// Remaining time below which a clock is flagged as low
    #[serde(with = "duration_secs")]
    pub low_time_threshold: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            minutes: 3.0,
            increment_secs: 0.0,
            tick_interval: Duration::from_secs(1),
            keepalive_interval: Duration::from_secs(30),
            settle_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
            start_backoff: BackoffConfig::default(),
            low_time_threshold: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Initial time control described by this configuration
    pub fn time_control(&self) -> Result<TimeControl, InputError> {
        let invalid = |v: f64| InputError::InvalidTimeValue(v.to_string());
        let base = duration_from_secs(self.minutes * 60.0).ok_or_else(|| invalid(self.minutes))?;
        let increment =
            duration_from_secs(self.increment_secs).ok_or_else(|| invalid(self.increment_secs))?;
        Ok(TimeControl::new(base, increment))
    }

    /// Reject periods the runtime cannot schedule
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be greater than zero".to_string(),
            ));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "keepalive_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = ClientConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.settle_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_time_control_from_config() {
        let config = ClientConfig {
            minutes: 2.5,
            increment_secs: 3.0,
            ..Default::default()
        };
        let tc = config.time_control().unwrap();
        assert_eq!(tc.base, Duration::from_secs(150));
        assert_eq!(tc.increment, Duration::from_secs(3));
    }

    #[test]
    fn test_negative_minutes_rejected() {
        let config = ClientConfig {
            minutes: -1.0,
            ..Default::default()
        };
        assert!(config.time_control().is_err());
    }

    #[test]
    fn test_oversized_time_control_rejected() {
        let config = ClientConfig {
            increment_secs: 1e30,
            ..Default::default()
        };
        assert!(config.time_control().is_err());
    }

    #[test]
    fn test_zero_periods_rejected() {
        assert!(ClientConfig::default().validate().is_ok());

        let config: ClientConfig = toml::from_str("tick_interval = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ClientConfig {
            keepalive_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
