//! Error responses of the trigger endpoints.
//!
//! Every failure answers with `{"error": {"code": ..., "message": ...}}`.
//! Anything the caller cannot fix (storage, queue, upstream, timeout) is a
//! 500 so external schedulers retry the trigger.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::FeedcastError;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The requested component or record does not exist.
    NotFound,
    /// The request body was rejected.
    UnprocessableEntity,
    /// The trigger ran out of time.
    DeadlineExceeded,
    /// Storage, queue or upstream failure.
    InternalError,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::DeadlineExceeded | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
}

/// Error returned by a trigger handler.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.code.status(), Json(body)).into_response()
    }
}

impl From<FeedcastError> for ApiError {
    fn from(err: FeedcastError) -> Self {
        match err {
            FeedcastError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            FeedcastError::Validation(message) => {
                ApiError::new(ErrorCode::UnprocessableEntity, message)
            }
            FeedcastError::DeadlineExceeded(what) => {
                tracing::error!("Trigger ran past its deadline: {}", what);
                ApiError::new(ErrorCode::DeadlineExceeded, format!("deadline exceeded: {what}"))
            }
            other => {
                tracing::error!("Trigger failed: {}", other);
                ApiError::new(ErrorCode::InternalError, "An internal error occurred")
            }
        }
    }
}
