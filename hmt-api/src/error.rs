//! Error types for hmt-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Task missing, not the caller's, or without a linked template (404)
    #[error("Task or template not found")]
    TaskOrTemplateNotFound,

    /// Resource not found (404), carrying a machine-readable code
    #[error("Resource not found: {message}")]
    NotFound { code: &'static str, message: String },

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or unknown API token (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// hmt-common error
    #[error("Common error: {0}")]
    Common(#[from] hmt_common::Error),
}

impl ApiError {
    pub fn task_not_found(task_id: &str) -> Self {
        ApiError::NotFound {
            code: "TASK_NOT_FOUND",
            message: format!("Task {} not found", task_id),
        }
    }

    pub fn template_not_found(template_id: &str) -> Self {
        ApiError::NotFound {
            code: "TEMPLATE_NOT_FOUND",
            message: format!("Template {} not found", template_id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::TaskOrTemplateNotFound => (
                StatusCode::NOT_FOUND,
                "TASK_OR_TEMPLATE_NOT_FOUND",
                "Task or template not found".to_string(),
            ),
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid API token".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Common(hmt_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg)
            }
            ApiError::Common(hmt_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            error!("{}: {}", error_code, message);
        }

        let body = Json(json!({
            "error": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
