//! `POST /api/shipping/cache/cleanup`.
//!
//! Removes expired rate rows. Meant for a scheduler hitting the endpoint;
//! the CLI's `cleanup` command does the same without the server.

use crate::error::ApiError;
use crate::handler::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Output of the cleanup endpoint.
#[derive(Debug, Serialize)]
pub struct CleanupOutput {
    /// Number of rows deleted.
    pub deleted: u64,
}

pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupOutput>, ApiError> {
    let deleted = state.cache.cleanup_expired().await?;
    Ok(Json(CleanupOutput { deleted }))
}
