//! HTTP route handlers.
//!
//! The lookup endpoints share one response shape: the results, where they
//! came from, and an optional message for the degraded paths.

pub mod cache;
pub mod location;
pub mod rates;

#[cfg(test)]
pub mod testing;

use axum::Json;
use serde::Serialize;

/// Where a lookup's results came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Fresh rows from the local cache.
    Cache,
    /// A live vendor answer.
    Vendor,
    /// Loosely matched local rows, served because the vendor failed.
    CacheFallback,
    /// Nothing was looked up (the request was rejected).
    None,
}

/// Body of a lookup response.
#[derive(Debug, Serialize)]
pub struct LookupResponse<T> {
    pub results: Vec<T>,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> LookupResponse<T> {
    pub fn found(results: Vec<T>, source: Source) -> Self {
        let count = Some(results.len());
        Self { results, source, count, message: None }
    }

    /// Empty answer for a rejected request; no cache or vendor work was done.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { results: Vec::new(), source: Source::None, count: None, message: Some(message.into()) }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Lenient boolean query flag: `1`, `true`, `yes`, `on` (any case).
pub fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
