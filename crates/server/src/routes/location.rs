//! Location search endpoint.
//!
//! `GET /api/location/search?q=&limit=` searches the local location table
//! first and only asks the vendor when nothing matches. Vendor answers are
//! upserted so the next search for the same place stays local.

use super::{LookupResponse, Source};
use crate::error::ApiError;
use crate::handler::AppState;
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use shipquote_core::Location;

/// Shortest search text worth a lookup.
const MIN_QUERY_CHARS: usize = 3;

/// Longest search text the vendor accepts.
const MAX_QUERY_CHARS: usize = 100;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

/// Raw query string; values are parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// Result limit: default 10, clamped to 1..=50, unparseable values use the default.
fn parse_limit(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, MAX_LIMIT as i64) as usize)
        .unwrap_or(DEFAULT_LIMIT)
}

pub async fn search(
    State(state): State<AppState>, Query(params): Query<SearchParams>,
) -> Result<Json<LookupResponse<Location>>, ApiError> {
    let q = params.q.as_deref().unwrap_or_default().trim().to_string();
    let chars = q.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Ok(Json(LookupResponse::rejected(format!(
            "query must be at least {MIN_QUERY_CHARS} characters"
        ))));
    }
    if chars > MAX_QUERY_CHARS {
        return Ok(Json(LookupResponse::rejected(format!(
            "query must be at most {MAX_QUERY_CHARS} characters"
        ))));
    }
    let limit = parse_limit(params.limit.as_deref());
    let db = state.cache.db();

    match db.search_locations(&q, limit).await {
        Ok(rows) if !rows.is_empty() => {
            tracing::debug!(q = %q, count = rows.len(), "location cache hit");
            return Ok(Json(LookupResponse::found(rows, Source::Cache)));
        }
        Ok(_) => tracing::debug!(q = %q, "location cache miss"),
        Err(e) => tracing::warn!(error = %e, q = %q, "location cache read failed, treating as miss"),
    }

    match state.vendor.search_locations(&q).await {
        Ok(mut locations) => {
            if !locations.is_empty() {
                let db = db.clone();
                let rows = locations.clone();
                // Spawned so the write completes even if the caller disconnects.
                let write = tokio::spawn(async move {
                    if let Err(e) = db.upsert_locations(&rows).await {
                        tracing::warn!(error = %e, "failed to cache vendor locations");
                    }
                });
                if let Err(e) = write.await {
                    tracing::warn!(error = %e, "location cache write task failed");
                }
            }
            locations.truncate(limit);
            Ok(Json(LookupResponse::found(locations, Source::Vendor)))
        }
        Err(err) => {
            tracing::warn!(error = %err, vendor = state.vendor.id(), q = %q, "vendor location search failed");
            let fallback = db.search_locations_loose(&q, limit).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "location fallback read failed");
                Vec::new()
            });
            if fallback.is_empty() {
                return Err(err.into());
            }
            Ok(Json(
                LookupResponse::found(fallback, Source::CacheFallback)
                    .with_message("shipping vendor unavailable; showing cached matches"),
            ))
        }
    }
}
