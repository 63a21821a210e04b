//! `/api/admin/*`. Role checks live in the services; these only translate.
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use concern_common::{CreateSubadminRequest, IssueStatus, IssueView, Statistics, UserView};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IssueQuery {
    #[serde(default)]
    pub status: Option<IssueStatus>,
}

pub async fn issues(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<IssueQuery>,
) -> Result<Json<Vec<IssueView>>, AppError> {
    Ok(Json(state.issues.list_all(&user.session, query.status).await?))
}

pub async fn users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<UserView>>, AppError> {
    Ok(Json(state.auth.list_users(&user.session).await?))
}

pub async fn create_subadmin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateSubadminRequest>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let created = state.auth.create_subadmin(&user.session, request).await?;
    Ok((StatusCode::CREATED, Json(created.to_view())))
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Statistics>, AppError> {
    Ok(Json(state.issues.statistics(&user.session).await?))
}
