//! HTTP application wiring.
//!
//! Builds the axum router, its middleware, and the shared state injected
//! into the route handlers.

use crate::error::panic_response;
use crate::routes;
use axum::Router;
use axum::routing::{get, post};
use shipquote_client::ShippingVendor;
use shipquote_core::ShippingCache;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Rate cache; its [`CacheDb`](shipquote_core::CacheDb) also holds the location table.
    pub cache: ShippingCache,
    pub vendor: Arc<dyn ShippingVendor>,
}

impl AppState {
    pub fn new(cache: ShippingCache, vendor: Arc<dyn ShippingVendor>) -> Self {
        Self { cache, vendor }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/location/search", get(routes::location::search))
        .route(
            "/api/shipping/rates",
            get(routes::rates::get_rates).delete(routes::cache::invalidate::invalidate),
        )
        .route("/api/shipping/cache/stats", get(routes::cache::stats::stats))
        .route("/api/shipping/cache/cleanup", post(routes::cache::purge::cleanup))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
