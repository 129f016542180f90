//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Error returned by every handler; rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<docket_core::Error> for ApiError {
    fn from(err: docket_core::Error) -> Self {
        match err {
            docket_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            docket_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            // Malformed worker payloads are the caller's fault.
            docket_core::Error::Serialization(msg) => ApiError::BadRequest(msg),
            other => {
                error!(subsystem = "api", error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
