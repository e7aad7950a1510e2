use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::DbError;
use crate::lifecycle::LifecycleError;

/// API error codes for client handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    BadRequest,
    Unauthorized,
    PreconditionFailed,
    Conflict,
    DatabaseError,
    InternalError,
    ValidationError,
}

/// Standard API error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

pub type ApiResult<T> = Result<T, AppError>;

/// Application error that converts to HTTP responses
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    pub fn new(status: StatusCode, body: ApiError) -> Self {
        Self { status, body }
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorCode::NotFound, format!("{} not found", resource)),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiError::new(ErrorCode::BadRequest, message))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ApiError::new(ErrorCode::Unauthorized, message))
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            ApiError::new(ErrorCode::PreconditionFailed, message),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiError::new(ErrorCode::Conflict, message))
    }

    /// Stale `version` in the request; the client should reload.
    pub fn stale(expected: i64, current: i64) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            ApiError::new(
                ErrorCode::Conflict,
                "Ticket was modified by someone else; reload and retry",
            )
            .with_details(serde_json::json!({
                "expectedVersion": expected,
                "currentVersion": current,
            })),
        )
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorCode::DatabaseError, err.to_string()),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorCode::InternalError, message),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ApiError::new(ErrorCode::ValidationError, message),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Self::not_found(&msg),
            DbError::Validation(msg) => Self::validation(msg),
            DbError::Conflict(msg) => Self::conflict(msg),
            DbError::Lock(msg) => Self::internal(msg),
            other => {
                tracing::error!("Database error: {}", other);
                Self::database(other)
            }
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::PreconditionViolation(msg) => Self::precondition_failed(msg),
            LifecycleError::ValidationFailure(msg) => Self::validation(msg),
        }
    }
}
