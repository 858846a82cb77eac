//! HTTP error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Every upstream provider failed.
    BadGateway(String),
    Internal(String),
}

impl From<nexus_core::Error> for ApiError {
    fn from(err: nexus_core::Error) -> Self {
        match &err {
            nexus_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            nexus_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            nexus_core::Error::AggregateFailure { .. } | nexus_core::Error::Transport { .. } => {
                ApiError::BadGateway(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
