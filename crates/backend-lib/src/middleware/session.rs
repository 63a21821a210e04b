//! Bearer session extraction.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::Session;
use crate::error::AppError;
use crate::validation::validate_session_token;
use crate::AppState;

/// The caller's live session. Rejects with 401 when the bearer token is
/// missing, malformed, unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub session: Session,
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let token = validate_session_token(token).map_err(|_| AppError::Unauthorized)?;
        let session = state
            .sessions
            .get(token)
            .await
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            token: token.to_string(),
            session,
        })
    }
}
