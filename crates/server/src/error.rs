//! Structured errors for the shipquote HTTP API.
//!
//! Every failure leaves the server as `{ "error": ..., "source"?: ... }` with
//! a non-2xx status. Store failures are logged here and answered with a
//! generic message so SQL details never reach clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shipquote_client::VendorError;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Cache or input error from core.
    #[error(transparent)]
    Cache(#[from] shipquote_core::Error),

    /// The vendor failed and no fallback rows existed.
    #[error(transparent)]
    Vendor(#[from] VendorError),
}

impl ApiError {
    /// Status the response is sent with.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Cache(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Vendor(e) => e
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Cache(e) if e.is_client_facing() => ErrorBody { error: e.to_string(), source: None },
            ApiError::Cache(e) => {
                tracing::error!(error = %e, "cache failure");
                ErrorBody { error: "internal server error".to_string(), source: None }
            }
            ApiError::Vendor(e) => {
                tracing::error!(error = %e, %status, "vendor failure with no cached fallback");
                ErrorBody { error: e.public_message(), source: Some("none") }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Response for a handler that panicked.
pub fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    internal_error()
}

/// Generic 500 body.
pub fn internal_error() -> Response {
    let body = ErrorBody { error: "internal server error".to_string(), source: None };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipquote_core::Error;

    #[test]
    fn test_invalid_input_is_400() {
        let err = ApiError::from(Error::InvalidInput("weight must be a positive integer".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_error_is_500() {
        let err = ApiError::from(Error::MigrationFailed("boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_vendor_status_is_mirrored() {
        let err = ApiError::from(VendorError::HttpError { status: 502, message: None });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(VendorError::RateLimited);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_vendor_without_status_is_500() {
        assert_eq!(ApiError::from(VendorError::Timeout).status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(VendorError::HttpError { status: 200, message: None });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
