// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! JSON request handlers, grouped by route prefix.
pub mod account;
pub mod admin;
pub mod auth;
pub mod issues;

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
