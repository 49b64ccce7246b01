//! Structured error handling for the API

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{context::ContextError, db::LedgerError};

/// API error response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Application error types
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // Client errors (4xx)
    Validation { field: String, message: String },
    NotFound(String),
    RequestTimeout,
    RateLimitExceeded { retry_after: u64 },

    // Server errors (5xx)
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get HTTP status code for error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound(_) => "BET_NOT_FOUND",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get user-facing message. Internal details are never exposed.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation { field, message } => {
                format!("validation error for field '{}': {}", field, message)
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::RequestTimeout => "Request cancelled or timeout".to_string(),
            AppError::RateLimitExceeded { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn log(&self) {
        let code = self.error_code();
        match self {
            AppError::Validation { field, message } => {
                tracing::warn!(error_code = code, field = %field, reason = %message, "validation error");
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_code = code, reason = %msg, "resource not found");
            }
            AppError::RequestTimeout => {
                tracing::warn!(error_code = code, "request cancelled or timeout");
            }
            AppError::RateLimitExceeded { retry_after } => {
                tracing::warn!(error_code = code, retry_after, "rate limited");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_code = code, error = %msg, "unhandled error");
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.message(),
            code: self.error_code().to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimitExceeded { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<ContextError> for AppError {
    fn from(_: ContextError) -> Self {
        AppError::RequestTimeout
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => AppError::NotFound("bet not found".to_string()),
            LedgerError::Context(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(_: serde_json::Error) -> Self {
        AppError::validation("body", "invalid request body")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
