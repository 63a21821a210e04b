//! `/api/auth/*`: registration, login and the token flows.
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Extensions, HeaderMap, StatusCode},
    Json,
};
use concern_common::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResendVerificationRequest, ResetPasswordRequest, ResetTokenStatus,
    VerifyEmailRequest,
};
use metrics::counter;

use crate::auth::password::ensure_confirmed;
use crate::error::AppError;
use crate::metrics::RATE_LIMITED;
use crate::middleware::rate_limit::client_key;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let response = state.auth.register_student(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Password login. Repeated failures from one client lock it out for a while.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let client = client_key(
        &headers,
        &extensions,
        state.settings.rate_limit.trust_proxy_headers,
    );
    if !state.login_limiter.check_rate_limit(&client) {
        counter!(RATE_LIMITED, "scope" => "login").increment(1);
        return Err(AppError::AuthRateLimited);
    }

    match state.auth.login(&request.username, &request.password).await {
        Ok(outcome) => {
            state.login_limiter.record_success(&client);
            Ok(Json(LoginResponse {
                session_token: outcome.token,
                expires_at: outcome.session.expires_at,
                user: outcome.user.to_view(),
            }))
        },
        Err(AppError::InvalidCredentials) => {
            state.login_limiter.record_failed_attempt(&client);
            Err(AppError::InvalidCredentials)
        },
        Err(e) => Err(e),
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Json<MessageResponse> {
    state.auth.logout(&user.token).await;
    Json(MessageResponse::new("Logged out"))
}

/// Confirm a verification code. Too many wrong codes lock the account's
/// verification for a while, whichever client sends them.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = request.user_id.as_str();
    if !state.verify_limiter.check_rate_limit(user_id) {
        counter!(RATE_LIMITED, "scope" => "verify_email").increment(1);
        return Err(AppError::AuthRateLimited);
    }

    match state.auth.verify_email(user_id, &request.code).await {
        Ok(()) => {
            state.verify_limiter.record_success(user_id);
            Ok(Json(MessageResponse::new("Email verified")))
        },
        Err(e @ (AppError::TokenNotFound | AppError::TokenExpired | AppError::TokenAlreadyUsed)) => {
            state.verify_limiter.record_failed_attempt(user_id);
            Err(e)
        },
        Err(e) => Err(e),
    }
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.resend_verification(&request.user_id).await?;
    Ok(Json(MessageResponse::new("Verification code sent")))
}

/// Same answer whether or not an account matched
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .request_password_reset(request.channel, &request.contact, &request.student_id)
        .await?;
    Ok(Json(MessageResponse::new(
        "If the details match an account, a reset link has been sent",
    )))
}

pub async fn check_reset_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ResetTokenStatus>, AppError> {
    let valid = state.auth.check_reset_token(&token).await?;
    Ok(Json(ResetTokenStatus { valid }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    ensure_confirmed(&request.new_password, &request.confirm_password)?;
    state
        .auth
        .reset_password(&request.token, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
