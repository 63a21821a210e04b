//! `/api/account/*`: the signed-in user's own account.
use std::sync::Arc;

use axum::{extract::State, Json};
use concern_common::{ChangePasswordRequest, MessageResponse, UpdateProfileRequest, UserView};

use crate::auth::password::ensure_confirmed;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    ensure_confirmed(&request.new_password, &request.confirm_password)?;
    state
        .auth
        .change_password(
            &user.session.user_id,
            &request.current_password,
            &request.new_password,
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let record = state.auth.get_user(&user.session.user_id).await?;
    Ok(Json(record.to_view()))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, AppError> {
    let record = state
        .auth
        .update_profile(&user.session.user_id, request)
        .await?;
    Ok(Json(record.to_view()))
}
