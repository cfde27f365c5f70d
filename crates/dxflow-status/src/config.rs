//! Status tracking configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! poll_interval_ms = 1000
//! request_timeout_ms = 10000
//! confidence_threshold = 0.6
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 250
//! max_backoff_ms = 8000
//! multiplier = 2.0
//! jitter = 0.1
//! ```

use crate::error::{ConfigError, StatusError};
use crate::workflow::DEFAULT_CONFIDENCE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Polling and routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Delay between successful polls
    pub poll_interval_ms: u64,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// Confidence below which follow-up questions are asked
    pub confidence_threshold: f64,
    /// Retry policy for failed polls
    pub retry: RetryPolicy,
}

impl StatusConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With confidence threshold
    #[inline]
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse and validate TOML
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StatusError> {
        let path = path.as_ref();
        let raw =
            std::fs::read_to_string(path).map_err(|e| StatusError::io_error(path, e))?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded status config");
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        self.retry.validate()
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            request_timeout_ms: 10_000,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Fetch attempts per poll before reporting failure
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Random spread applied to each delay, as a fraction of it
    pub jitter: f64,
}

impl RetryPolicy {
    /// Never retry
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// With attempt limit
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Without jitter, for reproducible delays
    #[inline]
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be >= 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "retry.jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms exceeds retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 250,
            max_backoff_ms: 8000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = StatusConfig::from_toml_str("").unwrap();
        assert_eq!(config, StatusConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_override() {
        let config = StatusConfig::from_toml_str(
            "poll_interval_ms = 250\n[retry]\nmax_attempts = 2\n",
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_backoff_ms, 250);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(StatusConfig::from_toml_str("confidence_threshold = 1.5").is_err());
        assert!(StatusConfig::from_toml_str("[retry]\nmultiplier = 0.5").is_err());
        assert!(StatusConfig::from_toml_str("[retry]\nmax_attempts = 0").is_err());
        assert!(StatusConfig::from_toml_str("poll_interval_ms = 0").is_err());
    }

    #[test]
    fn rejects_bad_syntax() {
        let err = StatusConfig::from_toml_str("poll_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_ms = 500").unwrap();
        let config = StatusConfig::load(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StatusConfig::load("/nonexistent/dxflow.toml").unwrap_err();
        assert!(matches!(err, StatusError::Io { .. }));
    }

    #[test]
    fn toml_output_reparses() {
        let config = StatusConfig::new().with_confidence_threshold(0.75);
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(StatusConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
