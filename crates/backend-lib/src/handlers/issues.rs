//! `/api/issues/*`
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use concern_common::{
    IssueView, MessageResponse, Role, SubmitIssueRequest, UpdateIssueStatusRequest,
};

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

/// Students see their own issues, staff see every visible one
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<IssueView>>, AppError> {
    let issues = match user.session.role {
        Role::Student => state.issues.list_for_student(&user.session).await?,
        Role::Subadmin | Role::Supaadmin => state.issues.list_all(&user.session, None).await?,
    };
    Ok(Json(issues))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<SubmitIssueRequest>,
) -> Result<(StatusCode, Json<IssueView>), AppError> {
    let issue = state.issues.submit(&user.session, request).await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<IssueView>, AppError> {
    Ok(Json(state.issues.get(&user.session, &id).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.issues.delete(&user.session, &id).await?;
    Ok(Json(MessageResponse::new("Issue deleted")))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateIssueStatusRequest>,
) -> Result<Json<IssueView>, AppError> {
    let issue = state
        .issues
        .update_status(&user.session, &id, request.status, request.response)
        .await?;
    Ok(Json(issue))
}
