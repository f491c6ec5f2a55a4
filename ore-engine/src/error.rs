//! Error types for the HTTP layer

use crate::providers::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. reprocessing a job that is running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream provider failure (502), or 503 when none is configured
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// ore-common error
    #[error("Common error: {0}")]
    Common(ore_common::Error),
}

impl From<ore_common::Error> for ApiError {
    fn from(err: ore_common::Error) -> Self {
        match err {
            ore_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            ore_common::Error::Conflict(msg) => ApiError::Conflict(msg),
            ore_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Provider(ref err @ ProviderError::NotConfigured(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_NOT_CONFIGURED",
                err.to_string(),
            ),
            ApiError::Provider(ref err) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", err.to_string()),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
