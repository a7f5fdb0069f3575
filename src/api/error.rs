//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::error::SchedulingError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_event_ids: Option<Vec<String>>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{message}")]
    Conflict {
        message: String,
        conflicting_event_ids: Vec<String>,
    },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, conflicting_event_ids) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", detail, None)
            }
            ApiError::Conflict {
                message,
                conflicting_event_ids,
            } => (
                StatusCode::CONFLICT,
                "CONFLICT",
                message,
                Some(conflicting_event_ids),
            ),
            ApiError::InvalidTransition(detail) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", detail, None)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                conflicting_event_ids,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            SchedulingError::Validation(detail) => ApiError::BadRequest(detail),
            SchedulingError::Conflict { ref event_ids } => ApiError::Conflict {
                conflicting_event_ids: event_ids.clone(),
                message: err.to_string(),
            },
            SchedulingError::InvalidTransition { .. } => {
                ApiError::InvalidTransition(err.to_string())
            }
            SchedulingError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Scheduling(e) => e.into(),
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}
