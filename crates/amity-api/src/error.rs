use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use amity_db::DbError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Deliberately vague: unknown id and wrong password both land here so
    /// the response never reveals which one it was.
    #[error("authentication failed")]
    AuthFailed,
    #[error("invalid token")]
    InvalidToken,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid request: {0}")]
    BadRequest(&'static str),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::AuthFailed | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Db(db) => match db {
                DbError::DuplicateId | DbError::DuplicateNickname | DbError::DuplicateRequest => {
                    StatusCode::CONFLICT
                }
                DbError::UserNotFound | DbError::NoSuchRequest | DbError::NotFound => {
                    StatusCode::NOT_FOUND
                }
                DbError::SelfRequest => StatusCode::BAD_REQUEST,
                DbError::Forbidden => StatusCode::FORBIDDEN,
                DbError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't leak store or internal details to clients.
        let message = match &self {
            ApiError::Db(DbError::Unavailable(detail)) => {
                error!("store unavailable: {}", detail);
                "store unavailable".to_string()
            }
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
