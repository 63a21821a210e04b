//! Verification code and reset token lifecycle.
//!
//! A token is `Unused` until it is consumed (`Used`) or its lifetime runs
//! out (`Expired`). A token validated at exactly `expires_at` is expired.
//! Consumption goes through [`Store::consume_token`], a compare-and-swap on
//! `used`, so a token is accepted at most once even under concurrent use.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use concern_common::UserId;
use metrics::counter;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::token_generator::{generate_reset_token, generate_verification_code};
use crate::clock::Clock;
use crate::config::TokenSettings;
use crate::error::AppError;
use crate::metrics::{TOKEN_CONSUMED, TOKEN_ISSUED, TOKEN_REJECTED};
use crate::models::{TokenPurpose, TokenRecord};
use crate::storage::Store;

/// Where a token stands at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unused,
    Expired,
    Used,
}

impl TokenRecord {
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Used
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Unused
        }
    }
}

/// Issues and consumes single-use tokens
pub struct TokenService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: TokenSettings,
}

impl TokenService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, settings: TokenSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Lifetime of tokens of the given purpose
    /// Lifetime of a `purpose` token; fails when it does not fit a `Duration`
    pub fn ttl(&self, purpose: TokenPurpose) -> Result<Duration, AppError> {
        let secs = match purpose {
            TokenPurpose::EmailVerification => self.settings.verification_ttl_secs,
            TokenPurpose::PasswordReset => self.settings.reset_ttl_secs,
        };
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| AppError::Internal(format!("token lifetime out of range: {secs}s")))
    }

    /// Create and store a fresh token for `user_id`
    #[instrument(skip(self), fields(purpose = purpose.as_str()))]
    pub async fn issue(
        &self,
        user_id: &str,
        purpose: TokenPurpose,
    ) -> Result<TokenRecord, AppError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl(purpose)?)
            .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?;
        let value = match purpose {
            TokenPurpose::EmailVerification => generate_verification_code(),
            TokenPurpose::PasswordReset => generate_reset_token(),
        };
        let token = TokenRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            value,
            purpose,
            created_at: now,
            expires_at,
            used: false,
            used_at: None,
        };
        self.store.insert_token(&token).await?;
        counter!(TOKEN_ISSUED, "purpose" => purpose.as_str()).increment(1);
        debug!(token_id = %token.id, expires_at = %token.expires_at, "token issued");
        Ok(token)
    }

    /// Consume a token and return the user it was issued to
    pub async fn validate_and_consume(
        &self,
        raw_value: &str,
        purpose: TokenPurpose,
    ) -> Result<UserId, AppError> {
        self.consume(raw_value, purpose, None).await
    }

    /// Consume a token that must belong to `user_id`.
    /// Tokens issued to other users are invisible here.
    pub async fn consume_for_user(
        &self,
        raw_value: &str,
        purpose: TokenPurpose,
        user_id: &str,
    ) -> Result<(), AppError> {
        self.consume(raw_value, purpose, Some(user_id)).await.map(|_| ())
    }

    /// Run the same checks as consumption without marking the token used
    pub async fn peek(&self, raw_value: &str, purpose: TokenPurpose) -> Result<UserId, AppError> {
        let now = self.clock.now();
        let token = self.select(raw_value, purpose, None, now).await?;
        Ok(token.user_id)
    }

    #[instrument(skip(self, raw_value), fields(purpose = purpose.as_str()))]
    async fn consume(
        &self,
        raw_value: &str,
        purpose: TokenPurpose,
        owner: Option<&str>,
    ) -> Result<UserId, AppError> {
        let now = self.clock.now();
        let token = self.select(raw_value, purpose, owner, now).await?;
        if !self.store.consume_token(&token.id, now).await? {
            // Someone else flipped `used` between our read and our write
            reject(purpose, TokenState::Used);
            return Err(AppError::TokenAlreadyUsed);
        }
        counter!(TOKEN_CONSUMED, "purpose" => purpose.as_str()).increment(1);
        debug!(token_id = %token.id, "token consumed");
        Ok(token.user_id)
    }

    /// Pick the active candidate, or explain why there is none.
    /// With several stale candidates the newest one decides the error.
    async fn select(
        &self,
        raw_value: &str,
        purpose: TokenPurpose,
        owner: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, AppError> {
        let raw_value = raw_value.trim();
        if raw_value.is_empty() {
            return Err(AppError::TokenNotFound);
        }
        let mut candidates: Vec<TokenRecord> = self
            .store
            .find_tokens(raw_value, purpose)
            .await?
            .into_iter()
            .filter(|t| t.purpose == purpose && owner.map_or(true, |o| t.user_id == o))
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(pos) = candidates
            .iter()
            .position(|t| t.state_at(now) == TokenState::Unused)
        {
            return Ok(candidates.swap_remove(pos));
        }
        match candidates.first().map(|t| t.state_at(now)) {
            None => {
                counter!(TOKEN_REJECTED, "purpose" => purpose.as_str(), "reason" => "not_found")
                    .increment(1);
                Err(AppError::TokenNotFound)
            },
            Some(TokenState::Used) => {
                reject(purpose, TokenState::Used);
                Err(AppError::TokenAlreadyUsed)
            },
            Some(_) => {
                reject(purpose, TokenState::Expired);
                Err(AppError::TokenExpired)
            },
        }
    }
}

fn reject(purpose: TokenPurpose, state: TokenState) {
    let reason = match state {
        TokenState::Used => "used",
        TokenState::Expired => "expired",
        TokenState::Unused => "unused",
    };
    counter!(TOKEN_REJECTED, "purpose" => purpose.as_str(), "reason" => reason).increment(1);
}
