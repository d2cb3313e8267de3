//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHIPQUOTE_*)
//! 2. TOML config file (if SHIPQUOTE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHIPQUOTE_*)
/// 2. TOML config file (if SHIPQUOTE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shipping vendor API key.
    ///
    /// Set via SHIPQUOTE_VENDOR_API_KEY environment variable.
    /// Required only when the vendor is actually called.
    #[serde(default)]
    pub vendor_api_key: Option<String>,

    /// Base URL of the shipping vendor API.
    ///
    /// Set via SHIPQUOTE_VENDOR_BASE_URL environment variable.
    #[serde(default = "default_vendor_base_url")]
    pub vendor_base_url: String,

    /// Minimum interval between two vendor requests, in milliseconds.
    ///
    /// Set via SHIPQUOTE_VENDOR_MIN_INTERVAL_MS environment variable.
    #[serde(default = "default_vendor_min_interval_ms")]
    pub vendor_min_interval_ms: u64,

    /// Path to SQLite cache database.
    ///
    /// Set via SHIPQUOTE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for vendor requests.
    ///
    /// Set via SHIPQUOTE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Vendor request timeout in milliseconds.
    ///
    /// Set via SHIPQUOTE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Address the HTTP server binds to.
    ///
    /// Set via SHIPQUOTE_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Lifetime of a cached shipping rate, in seconds.
    ///
    /// Set via SHIPQUOTE_RATE_TTL_SECS environment variable.
    #[serde(default = "default_rate_ttl_secs")]
    pub rate_ttl_secs: i64,

    /// Estimated cost of one vendor call, used for the savings figure in stats.
    ///
    /// Set via SHIPQUOTE_COST_PER_CALL environment variable.
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: i64,

    /// Maximum rows returned by a fallback read after a vendor failure.
    ///
    /// Set via SHIPQUOTE_FALLBACK_LIMIT environment variable.
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,
}

fn default_vendor_base_url() -> String {
    "https://rajaongkir.komerce.id/api/v1".into()
}

fn default_vendor_min_interval_ms() -> u64 {
    200
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shipquote-cache.sqlite")
}

fn default_user_agent() -> String {
    "shipquote/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_rate_ttl_secs() -> i64 {
    86_400 // 24h
}

fn default_cost_per_call() -> i64 {
    100
}

fn default_fallback_limit() -> usize {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vendor_api_key: None,
            vendor_base_url: default_vendor_base_url(),
            vendor_min_interval_ms: default_vendor_min_interval_ms(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            bind_addr: default_bind_addr(),
            rate_ttl_secs: default_rate_ttl_secs(),
            cost_per_call: default_cost_per_call(),
            fallback_limit: default_fallback_limit(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Minimum vendor request interval as Duration.
    pub fn vendor_min_interval(&self) -> Duration {
        Duration::from_millis(self.vendor_min_interval_ms)
    }

    /// Settings injected into [`crate::ShippingCache`].
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: chrono::Duration::seconds(self.rate_ttl_secs),
            cost_per_call: self.cost_per_call,
            fallback_limit: self.fallback_limit,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHIPQUOTE_`
    /// 2. TOML file from `SHIPQUOTE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHIPQUOTE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHIPQUOTE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the vendor API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the vendor API key is not set.
    pub fn require_vendor_api_key(&self) -> Result<&str, ConfigError> {
        self.vendor_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "vendor_api_key".into(),
                hint: "Set SHIPQUOTE_VENDOR_API_KEY environment variable".into(),
            })
    }
}
