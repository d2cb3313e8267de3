//! `GET /api/shipping/cache/stats`.

use crate::error::ApiError;
use crate::handler::AppState;
use axum::Json;
use axum::extract::State;
use shipquote_core::CacheStats;

pub async fn stats(State(state): State<AppState>) -> Result<Json<CacheStats>, ApiError> {
    Ok(Json(state.cache.stats().await?))
}

#[cfg(test)]
mod tests {
    use crate::handler::build_router;
    use crate::routes::testing::{MockVendor, quote, read_json, state_with};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shipquote_core::RateQuery;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_stats_reports_savings() {
        let (state, _) = state_with(MockVendor::default()).await;
        let query = RateQuery::new("501", "114", 1000, "jne");
        state.cache.set(&query, &quote("REG", 9000), None).await;
        state.cache.get(&query).await.unwrap();
        state.cache.get(&query).await.unwrap();

        let response = build_router(state)
            .oneshot(Request::get("/api/shipping/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = read_json(response).await;
        assert_eq!(json["total_entries"], 1);
        assert_eq!(json["total_hits"], 2);
        assert_eq!(json["expired_entries"], 0);
        assert_eq!(json["estimated_savings"], 200);
    }

    #[tokio::test]
    async fn test_stats_store_failure_is_generic_500() {
        let (state, _) = state_with(MockVendor::default()).await;
        state.cache.db().clone().close().await.unwrap();

        let response = build_router(state)
            .oneshot(Request::get("/api/shipping/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(response).await["error"], "internal server error");
    }
}
