//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `stale_after_secs` is 0 or `expire_after_secs` is not above it
    /// - `max_bullets` or `max_words` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `model` or `api_base_url` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_after_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stale_after_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.expire_after_secs <= self.stale_after_secs {
            return Err(ConfigError::Invalid {
                field: "expire_after_secs".into(),
                reason: format!("must be greater than stale_after_secs ({})", self.stale_after_secs),
            });
        }

        if self.max_bullets == 0 {
            return Err(ConfigError::Invalid { field: "max_bullets".into(), reason: "must be greater than 0".into() });
        }
        if self.max_words == 0 {
            return Err(ConfigError::Invalid { field: "max_words".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "model".into(), reason: "must not be empty".into() });
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "api_base_url".into(), reason: "must not be empty".into() });
        }

        if self.max_providers == 0 {
            tracing::warn!("max_providers is 0; only sources switched on will be queried");
        }

        Ok(())
    }
}
