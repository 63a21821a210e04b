// ============================
// backend-lib/src/storage/mod.rs
// ============================
//! Storage abstraction with interchangeable adapters.
//!
//! The auth and issue services only ever see `Arc<dyn Store>`. Three adapters
//! are provided: a process-local [`MemoryStore`], a relational [`SqliteStore`]
//! and a [`FirebaseStore`] speaking the Realtime Database REST API.
//!
//! Every mutation is a targeted update of the fields it changes. Token
//! consumption is a compare-and-swap on `used` in every adapter, so two
//! concurrent consumers of the same token can never both succeed.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concern_common::IssueStatus;

use crate::config::StoreSettings;
use crate::error::AppError;
use crate::models::{
    IssueFilter, IssueRecord, ProfileUpdate, TokenPurpose, TokenRecord, UserLookup, UserRecord,
};

pub mod firebase;
pub mod memory;
pub mod sqlite;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Why a password hash is being replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    /// The user supplied their current password
    Changed,
    /// A reset token was consumed; also stamps `password_reset_at`
    Reset,
}

/// Trait for storage backends
#[async_trait]
pub trait Store: Send + Sync {
    /// Adapter name for logs
    fn backend_name(&self) -> &'static str;

    /// Find a single user
    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<UserRecord>, AppError>;

    /// Insert a new user. Adapters that can detect uniqueness violations
    /// report them as the matching `Duplicate*` error.
    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError>;

    /// Replace a user's password hash. Returns `false` if no such user.
    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        change: PasswordChange,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Mark a user's email as verified. Returns `false` if no such user.
    async fn mark_email_verified(&self, user_id: &str, at: DateTime<Utc>)
        -> Result<bool, AppError>;

    /// Apply a partial profile update. Returns `false` if no such user.
    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// All users ordered by username
    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Store a freshly issued token
    async fn insert_token(&self, token: &TokenRecord) -> Result<(), AppError>;

    /// Every token (used, expired or active) matching value and purpose
    async fn find_tokens(
        &self,
        value: &str,
        purpose: TokenPurpose,
    ) -> Result<Vec<TokenRecord>, AppError>;

    /// Set `used = true` iff it is currently false. Returns whether this call flipped it.
    async fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Store a new issue
    async fn insert_issue(&self, issue: &IssueRecord) -> Result<(), AppError>;

    /// Get issue by id, including soft-deleted ones
    async fn get_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, AppError>;

    /// Issues matching the filter, newest first
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, AppError>;

    /// Set status (and optionally response). Returns `false` if no such issue.
    async fn update_issue_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        response: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}

/// Build the adapter selected in settings
pub fn open_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match settings {
        StoreSettings::Memory => Arc::new(MemoryStore::new()),
        StoreSettings::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
        StoreSettings::Firebase {
            url,
            auth,
            timeout_secs,
        } => Arc::new(FirebaseStore::new(
            url,
            auth.clone(),
            std::time::Duration::from_secs(*timeout_secs),
        )?),
    };
    tracing::info!(backend = store.backend_name(), "store opened");
    Ok(store)
}

/// Newest first, ties broken by id so listings are stable
pub(crate) fn sort_issues(issues: &mut [IssueRecord]) {
    issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
pub(crate) mod conformance;
