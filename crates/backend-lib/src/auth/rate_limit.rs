// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Lockout after repeated failed logins.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before rate limiting
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Failures are forgotten after this long without another one
const FAILURE_MEMORY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct RateLimitEntry {
    failed_attempts: u32,
    last_failure: Instant,
    lockout_expiry: Option<Instant>,
}

/// Per-client failed login tracking
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    attempts: Arc<DashMap<String, RateLimitEntry>>,
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    /// Record a failed login for `client`
    pub fn record_failed_attempt(&self, client: &str) {
        let now = Instant::now();
        let mut entry = self
            .attempts
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        // A served lockout starts a fresh count
        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(
                client,
                attempts = entry.failed_attempts,
                "client locked out after failed logins"
            );
        }
    }

    /// Forget failures after a successful login
    pub fn record_success(&self, client: &str) {
        self.attempts.remove(client);
    }

    /// Whether `client` may attempt to log in
    pub fn check_rate_limit(&self, client: &str) -> bool {
        match self.attempts.get(client) {
            Some(entry) => entry
                .lockout_expiry
                .map_or(true, |expiry| Instant::now() >= expiry),
            None => true,
        }
    }

    /// Drop entries whose lockout has ended or whose failures are stale
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, entry| match entry.lockout_expiry {
            Some(expiry) => now < expiry,
            None => now.duration_since(entry.last_failure) < FAILURE_MEMORY,
        });
    }
}
