use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Request-level error taxonomy. Every failure is terminal for the request;
/// handlers never retry or partially apply.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Duplicate email. Surfaced as 400 to match the public contract.
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    /// Bad password or missing bearer token.
    #[error("{0}")]
    Unauthenticated(&'static str),
    /// Token present but invalid or expired.
    #[error("{0}")]
    Forbidden(&'static str),
    /// Hash or store failure. The cause is logged, not leaked to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Conflict(m) => (StatusCode::BAD_REQUEST, m.to_string()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.to_string()),
            ApiError::Unauthenticated(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.to_string()),
            ApiError::Internal(e) => {
                error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}
