//! Process-local store.
//!
//! Used for development and tests. All maps live behind one lock so the
//! uniqueness checks in `insert_user` and the `used` flip in
//! `consume_token` are atomic.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concern_common::IssueStatus;
use parking_lot::RwLock;

use super::{sort_issues, PasswordChange, Store};
use crate::error::AppError;
use crate::models::{
    IssueFilter, IssueRecord, ProfileUpdate, TokenPurpose, TokenRecord, UserLookup, UserRecord,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    tokens: HashMap<String, TokenRecord>,
    issues: HashMap<String, IssueRecord>,
}

/// In-memory implementation of the Store trait
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_lookup(user: &UserRecord, lookup: &UserLookup<'_>) -> bool {
    match lookup {
        UserLookup::Id(id) => user.id == *id,
        UserLookup::Username(name) => user.username.eq_ignore_ascii_case(name.trim()),
        UserLookup::Email(email) => user.email.eq_ignore_ascii_case(email.trim()),
        UserLookup::StudentId(sid) => {
            !user.profile.student_id.is_empty()
                && user.profile.student_id.eq_ignore_ascii_case(sid.trim())
        },
        UserLookup::Phone(phone) => {
            !user.profile.phone.is_empty() && user.profile.phone == phone.trim()
        },
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<UserRecord>, AppError> {
        let tables = self.tables.read();
        if let UserLookup::Id(id) = lookup {
            return Ok(tables.users.get(id).cloned());
        }
        Ok(tables
            .users
            .values()
            .find(|u| matches_lookup(u, &lookup))
            .cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        for existing in tables.users.values() {
            if existing.username.eq_ignore_ascii_case(&user.username) {
                return Err(AppError::DuplicateUsername);
            }
            if !user.profile.student_id.is_empty()
                && existing
                    .profile
                    .student_id
                    .eq_ignore_ascii_case(&user.profile.student_id)
            {
                return Err(AppError::DuplicateStudentId);
            }
            if !user.email.is_empty() && existing.email.eq_ignore_ascii_case(&user.email) {
                return Err(AppError::DuplicateEmail);
            }
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        change: PasswordChange,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        user.updated_at = Some(at);
        if change == PasswordChange::Reset {
            user.password_reset_at = Some(at);
        }
        Ok(true)
    }

    async fn mark_email_verified(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.email_verified = true;
        user.verified_at = Some(at);
        Ok(true)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.get_mut(user_id) else {
            return Ok(false);
        };
        update.apply(&mut user.profile);
        user.updated_at = Some(at);
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users: Vec<UserRecord> = self.tables.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<(), AppError> {
        self.tables
            .write()
            .tokens
            .insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_tokens(
        &self,
        value: &str,
        purpose: TokenPurpose,
    ) -> Result<Vec<TokenRecord>, AppError> {
        Ok(self
            .tables
            .read()
            .tokens
            .values()
            .filter(|t| t.value == value && t.purpose == purpose)
            .cloned()
            .collect())
    }

    async fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        match tables.tokens.get_mut(token_id) {
            Some(token) if !token.used => {
                token.used = true;
                token.used_at = Some(at);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn insert_issue(&self, issue: &IssueRecord) -> Result<(), AppError> {
        self.tables
            .write()
            .issues
            .insert(issue.id.clone(), issue.clone());
        Ok(())
    }

    async fn get_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, AppError> {
        Ok(self.tables.read().issues.get(issue_id).cloned())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, AppError> {
        let mut issues: Vec<IssueRecord> = self
            .tables
            .read()
            .issues
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        sort_issues(&mut issues);
        Ok(issues)
    }

    async fn update_issue_status(
        &self,
        issue_id: &str,
        status: IssueStatus,
        response: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        let Some(issue) = tables.issues.get_mut(issue_id) else {
            return Ok(false);
        };
        issue.status = status;
        if let Some(response) = response {
            issue.response = response.to_string();
        }
        issue.updated_at = Some(at);
        Ok(true)
    }
}
