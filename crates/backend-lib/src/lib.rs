// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core functionality for the student concern portal server.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod issues;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthRateLimiter, AuthService, DefaultAuth, SessionManager};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::issues::IssueService;
use crate::middleware::rate_limit::RateLimiter;
use crate::notify::Notifier;
use crate::storage::Store;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// Issue service
    pub issues: Arc<IssueService>,
    /// Settings the process started with
    pub settings: Arc<Settings>,
    /// Storage backend
    pub store: Arc<dyn Store>,
    /// Request rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    /// Failed login lockout
    pub login_limiter: Arc<AuthRateLimiter>,
    /// Wrong verification codes, keyed by user id
    pub verify_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    /// Wire the services over an already opened store and notifier
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let sessions = Arc::new(SessionManager::new(
            clock.clone(),
            Duration::from_secs(settings.session_ttl_secs),
        ));
        let auth = Arc::new(DefaultAuth::new(
            store.clone(),
            clock.clone(),
            notifier.clone(),
            sessions.clone(),
            &settings,
        )?);
        let issues = Arc::new(IssueService::new(
            store.clone(),
            notifier,
            clock,
            settings.categories.clone(),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(
            Duration::from_secs(settings.rate_limit.window_secs),
            settings.rate_limit.max_requests,
        ));
        let login_limiter = Arc::new(AuthRateLimiter::new(
            settings.rate_limit.max_failed_logins,
            Duration::from_secs(settings.rate_limit.lockout_secs),
        ));

        let verify_limiter = Arc::new(AuthRateLimiter::new(
            settings.rate_limit.max_failed_logins,
            Duration::from_secs(settings.rate_limit.lockout_secs),
        ));

        Ok(Self {
            auth,
            sessions,
            issues,
            settings: Arc::new(settings),
            store,
            rate_limiter,
            login_limiter,
            verify_limiter,
        })
    }

    /// Open the configured store and notifier and use the system clock
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let store = storage::open_store(&settings.store)?;
        let notifier = notify::build_notifier(&settings.notifier)?;
        Self::new(settings, store, notifier, Arc::new(SystemClock))
    }
}
