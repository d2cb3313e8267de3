//! `DELETE /api/shipping/rates?origin=&destination=&weight=&courier=`.
//!
//! Drops every cached row for one key, expired or not, so the next lookup
//! goes to the vendor.

use crate::error::ApiError;
use crate::handler::AppState;
use crate::routes::rates::RateParams;
use axum::Json;
use axum::extract::{Query, State};
use serde::Serialize;
use shipquote_core::Error;

#[derive(Debug, Serialize)]
pub struct InvalidateOutput {
    pub invalidated: bool,
}

pub async fn invalidate(
    State(state): State<AppState>, Query(params): Query<RateParams>,
) -> Result<Json<InvalidateOutput>, ApiError> {
    let query = params.to_query().map_err(Error::InvalidInput)?;
    let invalidated = state.cache.invalidate(&query).await;
    Ok(Json(InvalidateOutput { invalidated }))
}
