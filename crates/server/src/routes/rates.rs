//! Shipping rate endpoint.
//!
//! `GET /api/shipping/rates` is a read-through over the rate cache:
//! fresh cached services are served as-is, otherwise the vendor is asked
//! and its answer appended to the cache. When the vendor fails, loosely
//! matching cached rows (other weights, expired rows) are served instead.

use super::{LookupResponse, Source, parse_flag};
use crate::error::ApiError;
use crate::handler::AppState;
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use shipquote_core::{Error, RateQuery, RateQuote};

/// Raw query string; values are parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct RateParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub weight: Option<String>,
    pub courier: Option<String>,
    pub force_refresh: Option<String>,
}

impl RateParams {
    /// The cache key, or a message naming the first bad field.
    pub fn to_query(&self) -> Result<RateQuery, String> {
        let weight = match self.weight.as_deref().map(str::trim) {
            None | Some("") => return Err("weight is required".to_string()),
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| format!("weight must be a positive integer, got {raw:?}"))?,
        };
        let query = RateQuery::new(
            self.origin.clone().unwrap_or_default(),
            self.destination.clone().unwrap_or_default(),
            weight,
            self.courier.clone().unwrap_or_default(),
        );
        query.validate().map_err(|e| match e {
            Error::InvalidInput(message) => message,
            other => other.to_string(),
        })?;
        Ok(query.normalized())
    }
}

pub async fn get_rates(
    State(state): State<AppState>, Query(params): Query<RateParams>,
) -> Result<Json<LookupResponse<RateQuote>>, ApiError> {
    let query = match params.to_query() {
        Ok(query) => query,
        Err(message) => return Ok(Json(LookupResponse::rejected(message))),
    };

    if parse_flag(params.force_refresh.as_deref()) {
        tracing::debug!(origin = %query.origin, destination = %query.destination, "forced refresh, skipping rate cache");
    } else {
        let cached = state.cache.lookup(&query).await?;
        if !cached.is_empty() {
            let quotes = cached.iter().map(|entry| entry.quote()).collect();
            return Ok(Json(LookupResponse::found(quotes, Source::Cache)));
        }
    }

    match state.vendor.calculate_rates(&query).await {
        Ok(rates) => {
            if !rates.quotes.is_empty() {
                let cache = state.cache.clone();
                let key = query.clone();
                let quotes = rates.quotes.clone();
                let raw = rates.raw;
                // Spawned so the write completes even if the caller disconnects.
                let write = tokio::spawn(async move { cache.set_many(&key, &quotes, Some(&raw)).await });
                if let Err(e) = write.await {
                    tracing::warn!(error = %e, "rate cache write task failed");
                }
            }
            Ok(Json(LookupResponse::found(rates.quotes, Source::Vendor)))
        }
        Err(err) => {
            tracing::warn!(error = %err, vendor = state.vendor.id(), origin = %query.origin, destination = %query.destination, "vendor rate calculation failed");
            let fallback = state.cache.fallback(&query).await;
            if fallback.is_empty() {
                return Err(err.into());
            }
            let quotes = fallback.iter().map(|entry| entry.quote()).collect();
            Ok(Json(
                LookupResponse::found(quotes, Source::CacheFallback)
                    .with_message("shipping vendor unavailable; showing cached rates that may be outdated"),
            ))
        }
    }
}
