// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router.
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{self, account, admin, auth, issues};
use crate::middleware::rate_limit;
use crate::AppState;

/// Create the portal router
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/reset-password/{token}", get(auth::check_reset_token));

    let account_routes = Router::new()
        .route("/change-password", post(account::change_password))
        .route(
            "/profile",
            get(account::profile).patch(account::update_profile),
        );

    let issue_routes = Router::new()
        .route("/", get(issues::list).post(issues::submit))
        .route("/{id}", get(issues::get).delete(issues::delete))
        .route("/{id}/status", post(issues::update_status));

    let admin_routes = Router::new()
        .route("/issues", get(admin::issues))
        .route("/users", get(admin::users))
        .route("/subadmins", post(admin::create_subadmin))
        .route("/statistics", get(admin::statistics));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/account", account_routes)
        .nest("/issues", issue_routes)
        .nest("/admin", admin_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
