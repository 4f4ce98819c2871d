//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (REPUTE_*)
//! 2. TOML config file (if REPUTE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheTtl;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (REPUTE_*)
/// 2. TOML config file (if REPUTE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reputation lookup service.
    ///
    /// Set via REPUTE_API_KEY environment variable. Without it lookups are
    /// skipped and the queue still drains.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed to the lookup service.
    ///
    /// Set via REPUTE_MODEL environment variable.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the lookup service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path to SQLite cache database.
    ///
    /// Set via REPUTE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Lookup request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Age after which a cached entry is refreshed in the background.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Age after which a cached entry is deleted.
    #[serde(default = "default_expire_after_secs")]
    pub expire_after_secs: u64,

    /// Upper bound on sources queried per lookup; `on` sources always count.
    #[serde(default = "default_max_providers")]
    pub max_providers: usize,

    /// Maximum summary bullets requested per review.
    #[serde(default = "default_max_bullets")]
    pub max_bullets: usize,

    /// Maximum words requested per summary bullet.
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Register hostnames that look like review aggregators as `auto` sources.
    #[serde(default = "default_true")]
    pub auto_add_sources: bool,

    /// Sources used when the settings store holds none yet.
    ///
    /// Set via REPUTE_DEFAULT_SOURCES (comma-separated) or the config file.
    #[serde(default = "default_sources")]
    pub default_sources: Vec<String>,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./repute-cache.sqlite")
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_stale_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_expire_after_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_providers() -> usize {
    5
}

fn default_max_bullets() -> usize {
    3
}

fn default_max_words() -> usize {
    15
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<String> {
    vec!["trustpilot.com".into(), "sitejabber.com".into(), "reddit.com".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_base_url: default_api_base_url(),
            db_path: default_db_path(),
            timeout_ms: default_timeout_ms(),
            stale_after_secs: default_stale_after_secs(),
            expire_after_secs: default_expire_after_secs(),
            max_providers: default_max_providers(),
            max_bullets: default_max_bullets(),
            max_words: default_max_words(),
            auto_add_sources: true,
            default_sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Staleness and expiry thresholds for the cache store.
    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl {
            stale_after: Duration::from_secs(self.stale_after_secs),
            expire_after: Duration::from_secs(self.expire_after_secs),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `REPUTE_`
    /// 2. TOML file from `REPUTE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("REPUTE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("REPUTE_")
                .ignore(&["CONFIG_FILE", "DEFAULT_SOURCES"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let mut config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        if let Ok(list) = std::env::var("REPUTE_DEFAULT_SOURCES") {
            config.default_sources = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;

        Ok(config)
    }

    /// Check if the API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the API key is not set or blank.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "api_key".into(),
                hint: "Set REPUTE_API_KEY environment variable".into(),
            })
    }
}
