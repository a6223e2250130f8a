use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the follow store.
///
/// "Already following" and "not following" are not errors: those come back
/// as `Ok(false)` from the store.
#[derive(Error, Debug)]
pub enum FollowError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
}

impl FollowError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        FollowError::InvalidArgument(msg.into())
    }
}

pub type FollowResult<T> = Result<T, FollowError>;

#[derive(Debug)]
pub enum AppError {
    ServiceUnavailable,
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
}

impl From<FollowError> for AppError {
    fn from(err: FollowError) -> Self {
        match err {
            FollowError::InvalidArgument(msg) => AppError::BadRequest(msg),
            FollowError::StorageUnavailable(e) => {
                tracing::error!("Follow storage error: {:?}", e);
                AppError::ServiceUnavailable
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        // Same shape as ApiResponse so clients parse one envelope
        let body = Json(json!({
            "success": false,
            "message": error_message,
            "data": null
        }));

        (status, body).into_response()
    }
}
