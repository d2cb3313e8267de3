//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

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
    /// - `rate_ttl_secs` is not positive or exceeds 30 days
    /// - `cost_per_call` is negative
    /// - `fallback_limit` is 0 or exceeds 200
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `vendor_base_url` is not an http(s) URL
    /// - `bind_addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_ttl_secs <= 0 {
            return Err(ConfigError::Invalid { field: "rate_ttl_secs".into(), reason: "must be greater than 0".into() });
        }
        if self.rate_ttl_secs > 30 * 86_400 {
            return Err(ConfigError::Invalid { field: "rate_ttl_secs".into(), reason: "must not exceed 30 days".into() });
        }

        if self.cost_per_call < 0 {
            return Err(ConfigError::Invalid { field: "cost_per_call".into(), reason: "must not be negative".into() });
        }

        if self.fallback_limit == 0 || self.fallback_limit > 200 {
            return Err(ConfigError::Invalid { field: "fallback_limit".into(), reason: "must be between 1 and 200".into() });
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

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.vendor_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "vendor_base_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "vendor_base_url".into(), reason: e.to_string() });
            }
        }

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "bind_addr".into(),
                reason: format!("not a socket address: {}", self.bind_addr),
            });
        }

        if self.vendor_min_interval_ms > self.timeout_ms {
            tracing::warn!(
                vendor_min_interval_ms = self.vendor_min_interval_ms,
                timeout_ms = self.timeout_ms,
                "vendor_min_interval_ms exceeds timeout_ms; queued vendor calls will be slow"
            );
        }

        Ok(())
    }
}
