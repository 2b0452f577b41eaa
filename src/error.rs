use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::feed::NoticeLevel;

/// Failures surfaced to the user by the feed modules.
///
/// Every variant carries the message shown to the user, so the HTTP layer
/// never has to invent wording of its own.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    UpstreamUnreachable(String),

    #[error("{0}")]
    UpstreamRequestFailure(String),

    /// Upstream answered 200 but its body reports a failure.
    #[error("{0}")]
    UpstreamApplication(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    StorageOperation(String),

    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UpstreamTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::UpstreamUnreachable(_)
            | AppError::UpstreamRequestFailure(_)
            | AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamApplication(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StorageOperation(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Severity used when the error is shown as a page notice.
    pub fn notice_level(&self) -> NoticeLevel {
        match self {
            AppError::UpstreamTimeout(_)
            | AppError::UpstreamUnreachable(_)
            | AppError::UpstreamRequestFailure(_)
            | AppError::UpstreamApplication(_)
            | AppError::Conflict(_) => NoticeLevel::Warning,
            AppError::Validation(_)
            | AppError::StorageUnavailable(_)
            | AppError::StorageOperation(_)
            | AppError::Unexpected(_) => NoticeLevel::Error,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures raised by a [`Storage`](crate::store::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate entry")]
    Duplicate,

    #[error(transparent)]
    Database(sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StorageError::Duplicate,
            _ => StorageError::Database(err),
        }
    }
}
