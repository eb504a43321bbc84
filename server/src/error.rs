//! API error taxonomy.
//!
//! Handlers return `Result<_, ApiError>`; the `IntoResponse` impl maps
//! each variant to an HTTP status and a JSON `{"error": ...}` body.
//! Internal failures are logged with full detail but surface only a
//! generic message to the caller.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Webhook signature mismatch. Nothing is stored.
    #[error("invalid signature")]
    Unauthorized,

    /// Missing or malformed request fields, rejected before touching the store.
    #[error("{0}")]
    Validation(String),

    /// Store failure or any other unexpected internal error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// JSON error body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid signature".to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(err) => {
                error!(error = %format!("{err:#}"), "internal_error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_status() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validation_status() {
        let response = ApiError::Validation("Email is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_hides_detail() {
        let response = ApiError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
