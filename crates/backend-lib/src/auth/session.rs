// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session token handling and management.
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use concern_common::{Role, UserId};
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::token_generator::generate_secure_token;
use crate::clock::Clock;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_EXPIRED};
use crate::models::UserRecord;

/// Session TTL used when none is configured
pub const SESSION_TTL: StdDuration = StdDuration::from_secs(60 * 60 * 24 * 7); // 7 days

/// How often the background task purges expired sessions
pub const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// A logged-in user
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Maps opaque bearer tokens to sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>, ttl: StdDuration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(7)),
        }
    }

    /// Start a session for `user` and return its token
    pub async fn create(&self, user: &UserRecord) -> (String, Session) {
        let token = generate_secure_token();
        let now = self.clock.now();
        let session = Session {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session.clone());

        counter!(SESSION_CREATED).increment(1);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);

        (token, session)
    }

    /// Live session for a token; expired sessions count as absent
    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;
        (self.clock.now() < session.expires_at).then(|| session.clone())
    }

    /// Log out. Returns whether the token was known.
    pub async fn revoke(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(token).is_some();
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        removed
    }

    /// Drop every session belonging to a user, e.g. after a password reset
    pub async fn revoke_user(&self, user_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        before - sessions.len()
    }

    /// Remove expired sessions and return how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now < s.expires_at);
        let removed = before - sessions.len();
        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        }
        removed
    }

    /// Periodically purge expired sessions until the runtime shuts down
    pub fn spawn_cleanup(self: &Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "purged expired sessions");
                }
            }
        })
    }
}
