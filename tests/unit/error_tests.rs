// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for the error module
use axum::{http::StatusCode, response::IntoResponse};
use backend_lib::error::AppError;
use backend_lib::validation::ValidationError;
use std::io::{Error as IoError, ErrorKind};

#[test]
fn test_app_error_display() {
    assert_eq!(
        AppError::InvalidCredentials.to_string(),
        "Invalid username or password"
    );
    assert_eq!(AppError::RateLimitExceeded.to_string(), "Rate limit exceeded");

    let io_error = AppError::Io(IoError::new(ErrorKind::NotFound, "File not found"));
    assert!(io_error.to_string().contains("IO error"));
}

#[test]
fn test_app_error_status_codes() {
    let cases = [
        (AppError::DuplicateUsername, StatusCode::CONFLICT),
        (AppError::DuplicateStudentId, StatusCode::CONFLICT),
        (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::Forbidden, StatusCode::FORBIDDEN),
        (AppError::EmailNotVerified, StatusCode::FORBIDDEN),
        (AppError::TokenExpired, StatusCode::BAD_REQUEST),
        (AppError::TokenAlreadyUsed, StatusCode::BAD_REQUEST),
        (AppError::NotFound("issue".to_string()), StatusCode::NOT_FOUND),
        (AppError::AuthRateLimited, StatusCode::TOO_MANY_REQUESTS),
        (
            AppError::StoreUnavailable("down".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AppError::Internal("test".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (error, status) in cases {
        assert_eq!(error.status_code(), status, "{error}");
    }
}

#[test]
fn test_error_codes_are_distinct() {
    let codes = [
        AppError::DuplicateUsername.error_code(),
        AppError::DuplicateStudentId.error_code(),
        AppError::DuplicateEmail.error_code(),
        AppError::TokenNotFound.error_code(),
        AppError::TokenExpired.error_code(),
        AppError::TokenAlreadyUsed.error_code(),
        AppError::InvalidToken.error_code(),
    ];
    let unique: std::collections::HashSet<_> = codes.iter().collect();
    assert_eq!(unique.len(), codes.len());
}

#[test]
fn test_sanitized_message_hides_internals() {
    let error = AppError::StoreUnavailable("connection refused at 10.0.0.5".to_string());
    assert!(!error.sanitized_message().contains("10.0.0.5"));
    let error = AppError::Internal("stack details".to_string());
    assert!(!error.sanitized_message().contains("stack"));
}

#[test]
fn test_validation_errors_become_invalid_input() {
    let error: AppError = ValidationError::InvalidEmail("nope".to_string()).into();
    assert!(matches!(error, AppError::InvalidInput(_)));
    assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_error_response_body() {
    let response = AppError::TokenAlreadyUsed.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "TOKEN_003");
    assert!(json["error"]["message"].is_string());
}
