// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Student ID already exists")]
    DuplicateStudentId,

    #[error("Email address already exists")]
    DuplicateEmail,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token already used")]
    TokenAlreadyUsed,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Email address not verified")]
    EmailNotVerified,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DuplicateUsername
            | AppError::DuplicateStudentId
            | AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::EmailNotVerified => StatusCode::FORBIDDEN,
            AppError::TokenNotFound
            | AppError::TokenExpired
            | AppError::TokenAlreadyUsed
            | AppError::InvalidToken
            | AppError::WeakPassword(_)
            | AppError::PasswordMismatch
            | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded | AppError::AuthRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            },
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Notification(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::DuplicateUsername => "REG_001",
            AppError::DuplicateStudentId => "REG_002",
            AppError::DuplicateEmail => "REG_003",
            AppError::InvalidCredentials => "AUTH_001",
            AppError::Unauthorized => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::Forbidden => "AUTH_004",
            AppError::EmailNotVerified => "AUTH_005",
            AppError::TokenNotFound => "TOKEN_001",
            AppError::TokenExpired => "TOKEN_002",
            AppError::TokenAlreadyUsed => "TOKEN_003",
            AppError::InvalidToken => "TOKEN_004",
            AppError::WeakPassword(_) => "PWD_001",
            AppError::PasswordMismatch => "PWD_002",
            AppError::StoreUnavailable(_) => "STORE_001",
            AppError::NotFound(_) => "NF_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::Notification(_) => "NOTIFY_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::DuplicateUsername
            | AppError::DuplicateStudentId
            | AppError::DuplicateEmail
            | AppError::WeakPassword(_)
            | AppError::PasswordMismatch
            | AppError::InvalidInput(_)
            | AppError::EmailNotVerified
            | AppError::InvalidCredentials => self.to_string(),
            AppError::TokenNotFound
            | AppError::TokenExpired
            | AppError::TokenAlreadyUsed
            | AppError::InvalidToken => {
                "Invalid or expired code, please request a new one".to_string()
            },
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::StoreUnavailable(_) => {
                "Service temporarily unavailable, please try again".to_string()
            },
            AppError::Notification(_) => "Failed to deliver notification".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
