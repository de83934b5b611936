//! Driver configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML document could not be parsed
    #[error("invalid driver configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values parsed but are unusable
    #[error("invalid driver configuration: {0}")]
    Invalid(String),
}

/// Sequence driver configuration
///
/// Durations are expressed in milliseconds in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Upper bound for a whole run
    #[serde(with = "millis")]
    pub run_timeout: Duration,
    /// Optional cap per step, never beyond what the run has left
    #[serde(with = "millis_opt", skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<Duration>,
    /// Observe the agent by polling its latest state at this interval
    /// instead of subscribing to pushed snapshots
    #[serde(with = "millis_opt", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<Duration>,
}

impl DriverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With run timeout
    #[inline]
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// With per-step cap
    #[inline]
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Observe by polling at `interval`
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Parse from a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// `ConfigError` if the document does not parse or a duration is zero.
    pub fn from_toml_str(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero durations
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_timeout.is_zero() {
            return Err(ConfigError::Invalid("run_timeout must be positive".into()));
        }
        if self.step_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid("step_timeout must be positive".into()));
        }
        if self.poll_interval.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid("poll_interval must be positive".into()));
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(600),
            step_timeout: None,
            poll_interval: None,
        }
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

pub(crate) mod millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => super::millis::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bound_a_run_at_ten_minutes() {
        let config = DriverConfig::new();
        assert_eq!(config.run_timeout, Duration::from_secs(600));
        assert!(config.step_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = DriverConfig::from_toml_str("run_timeout = 30000\nstep_timeout = 5000\n").unwrap();
        assert_eq!(config.run_timeout, Duration::from_secs(30));
        assert_eq!(config.step_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.poll_interval, None);
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert!(matches!(
            DriverConfig::from_toml_str("poll_interval = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DriverConfig::from_toml_str("run_timeout = \"soon\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn builders_chain() {
        let config = DriverConfig::new()
            .with_run_timeout(Duration::from_secs(1))
            .with_step_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(config.step_timeout, Some(Duration::from_millis(200)));
        assert_eq!(config.poll_interval, Some(Duration::from_millis(50)));
    }
}
