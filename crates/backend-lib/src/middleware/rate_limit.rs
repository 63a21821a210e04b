// crates/backend-lib/src/middleware/rate_limit.rs
//! Fixed-window request limiting per client.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics::counter;

use crate::metrics::RATE_LIMITED;
use crate::{error::AppError, AppState};

/// Request count for one client in the current window
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Per-client request counter
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Count a request; false when the client is over its budget
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.requests = 0;
            entry.window_start = now;
        }
        if entry.requests >= self.max_requests {
            return false;
        }
        entry.requests += 1;
        true
    }

    /// Drop clients whose window has closed
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, e| now.duration_since(e.window_start) < self.window);
    }
}

/// Client key for limiting and lockout.
///
/// Proxy headers are read only when `trust_proxy_headers` is set, since any
/// client can send them. Otherwise the peer address from `ConnectInfo` is
/// used; requests with neither share the `unknown` bucket.
pub fn client_key(headers: &HeaderMap, extensions: &Extensions, trust_proxy_headers: bool) -> String {
    let forwarded = trust_proxy_headers
        .then(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .or_else(|| {
                    headers
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|v| v.split(',').next())
                })
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .flatten();

    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(
        request.headers(),
        request.extensions(),
        state.settings.rate_limit.trust_proxy_headers,
    );
    if !state.rate_limiter.check(&client) {
        counter!(RATE_LIMITED).increment(1);
        tracing::debug!(%client, "request rate limited");
        return Err(AppError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}
