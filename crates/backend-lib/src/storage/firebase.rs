//! Firebase Realtime Database adapter (REST).
//!
//! Layout under the database root:
//!
//! ```text
//! users/{id}    UserRecord
//! tokens/{id}   TokenRecord
//! issues/{id}   IssueRecord
//! ```
//!
//! Lookups use `orderBy`/`equalTo` queries, so the database rules must carry
//! `.indexOn` for `username`, `email`, `profile/student_id`, `profile/phone`
//! on users, `value` on tokens and `student_id` on issues.
//!
//! Uniqueness on insert is checked with queries before the write and is not
//! atomic across processes. Token consumption is a conditional write guarded
//! by the node's ETag.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concern_common::IssueStatus;
use reqwest::header::{ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{sort_issues, PasswordChange, Store};
use crate::error::AppError;
use crate::models::{
    IssueFilter, IssueRecord, ProfileUpdate, TokenPurpose, TokenRecord, UserLookup, UserRecord,
};

const USERS: &str = "users";
const TOKENS: &str = "tokens";
const ISSUES: &str = "issues";

/// Conditional writes retried before giving up on a contended token
const CAS_ATTEMPTS: usize = 5;

pub struct FirebaseStore {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl FirebaseStore {
    /// `url` is the database root, e.g. `https://<project>.firebaseio.com`.
    /// `auth` is a database secret or ID token appended as `?auth=`.
    pub fn new(url: &str, auth: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}.json", self.base_url, path));
        match &self.auth {
            Some(auth) => builder.query(&[("auth", auth)]),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        let resp = check(self.request(Method::GET, path).send().await?)?;
        Ok(resp.json::<Option<T>>().await?)
    }

    /// Children of `collection` whose `field` equals `value`
    async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, AppError> {
        let order_by = serde_json::to_string(field)?;
        let equal_to = serde_json::to_string(value)?;
        let resp = self
            .request(Method::GET, collection)
            .query(&[("orderBy", order_by), ("equalTo", equal_to)])
            .send()
            .await?;
        let found = check(resp)?
            .json::<Option<HashMap<String, T>>>()
            .await?
            .unwrap_or_default();
        Ok(found.into_values().collect())
    }

    async fn all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, AppError> {
        Ok(self
            .get::<HashMap<String, T>>(collection)
            .await?
            .unwrap_or_default()
            .into_values()
            .collect())
    }

    async fn put<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<(), AppError> {
        check(self.request(Method::PUT, path).json(value).send().await?)?;
        Ok(())
    }

    /// Multi-path update of the given fields only
    async fn patch(&self, path: &str, fields: Map<String, Value>) -> Result<(), AppError> {
        check(self.request(Method::PATCH, path).json(&fields).send().await?)?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        Ok(self.get::<Value>(path).await?.is_some())
    }
}

fn check(resp: Response) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(AppError::StoreUnavailable(format!("firebase responded {status}")))
    }
}

/// Keys are generated ids; anything that could address another node is refused
fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['/', '.', '#', '$', '[', ']'])
}

fn node(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

fn put_field<T: Serialize>(
    fields: &mut Map<String, Value>,
    key: &str,
    value: T,
) -> Result<(), AppError> {
    fields.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(())
}

#[async_trait]
impl Store for FirebaseStore {
    fn backend_name(&self) -> &'static str {
        "firebase"
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<UserRecord>, AppError> {
        let (field, value) = match lookup {
            UserLookup::Id(id) => {
                if !valid_key(id) {
                    return Ok(None);
                }
                return self.get(&node(USERS, id)).await;
            },
            UserLookup::Username(name) => ("username", name.trim().to_lowercase()),
            UserLookup::Email(email) => ("email", email.trim().to_lowercase()),
            UserLookup::StudentId(sid) => ("profile/student_id", sid.trim().to_uppercase()),
            UserLookup::Phone(phone) => ("profile/phone", phone.trim().to_string()),
        };
        if value.is_empty() {
            return Ok(None);
        }
        let mut users: Vec<UserRecord> = self.query(USERS, field, &value).await?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users.into_iter().next())
    }

    async fn insert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        if !valid_key(&user.id) {
            return Err(AppError::InvalidInput("invalid user id".to_string()));
        }
        if self
            .find_user(UserLookup::Username(&user.username))
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateUsername);
        }
        if !user.profile.student_id.is_empty()
            && self
                .find_user(UserLookup::StudentId(&user.profile.student_id))
                .await?
                .is_some()
        {
            return Err(AppError::DuplicateStudentId);
        }
        if !user.email.is_empty()
            && self
                .find_user(UserLookup::Email(&user.email))
                .await?
                .is_some()
        {
            return Err(AppError::DuplicateEmail);
        }
        self.put(&node(USERS, &user.id), user).await
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
        change: PasswordChange,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let path = node(USERS, user_id);
        if !valid_key(user_id) || !self.exists(&path).await? {
            return Ok(false);
        }
        let mut fields = Map::new();
        put_field(&mut fields, "password_hash", password_hash)?;
        put_field(&mut fields, "updated_at", at)?;
        if change == PasswordChange::Reset {
            put_field(&mut fields, "password_reset_at", at)?;
        }
        self.patch(&path, fields).await?;
        Ok(true)
    }

    async fn mark_email_verified(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let path = node(USERS, user_id);
        if !valid_key(user_id) || !self.exists(&path).await? {
            return Ok(false);
        }
        let mut fields = Map::new();
        put_field(&mut fields, "email_verified", true)?;
        put_field(&mut fields, "verified_at", at)?;
        self.patch(&path, fields).await?;
        Ok(true)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let path = node(USERS, user_id);
        if !valid_key(user_id) || !self.exists(&path).await? {
            return Ok(false);
        }
        let mut fields = Map::new();
        let changes = [
            ("profile/first_name", &update.first_name),
            ("profile/last_name", &update.last_name),
            ("profile/phone", &update.phone),
            ("profile/level", &update.level),
            ("profile/department", &update.department),
            ("profile/program", &update.program),
        ];
        for (key, value) in changes {
            if let Some(value) = value {
                put_field(&mut fields, key, value)?;
            }
        }
        put_field(&mut fields, "updated_at", at)?;
        self.patch(&path, fields).await?;
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users: Vec<UserRecord> = self.all(USERS).await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn insert_token(&self, token: &TokenRecord) -> Result<(), AppError> {
        if !valid_key(&token.id) {
            return Err(AppError::InvalidInput("invalid token id".to_string()));
        }
        self.put(&node(TOKENS, &token.id), token).await
    }

    async fn find_tokens(
        &self,
        value: &str,
        purpose: TokenPurpose,
    ) -> Result<Vec<TokenRecord>, AppError> {
        let tokens: Vec<TokenRecord> = self.query(TOKENS, "value", value).await?;
        Ok(tokens.into_iter().filter(|t| t.purpose == purpose).collect())
    }

    async fn consume_token(&self, token_id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        if !valid_key(token_id) {
            return Ok(false);
        }
        let path = node(TOKENS, token_id);
        for _ in 0..CAS_ATTEMPTS {
            let resp = check(
                self.request(Method::GET, &path)
                    .header("X-Firebase-ETag", "true")
                    .send()
                    .await?,
            )?;
            let etag = resp
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| AppError::StoreUnavailable("firebase returned no ETag".into()))?;
            let Some(mut token) = resp.json::<Option<TokenRecord>>().await? else {
                return Ok(false);
            };
            if token.used {
                return Ok(false);
            }
            token.used = true;
            token.used_at = Some(at);

            let resp = self
                .request(Method::PUT, &path)
                .header(IF_MATCH, etag)
                .json(&token)
                .send()
                .await?;
            if resp.status() == StatusCode::PRECONDITION_FAILED {
                tracing::debug!(token_id, "token changed concurrently, re-reading");
                continue;
            }
            check(resp)?;
            return Ok(true);
        }
        Err(AppError::StoreUnavailable(
            "token update kept conflicting".to_string(),
        ))
    }

    async fn insert_issue(&self, issue: &IssueRecord) -> Result<(), AppError> {
        if !valid_key(&issue.id) {
            return Err(AppError::InvalidInput("invalid issue id".to_string()));
        }
        self.put(&node(ISSUES, &issue.id), issue).await
    }

    async fn get_issue(&self, issue_id: &str) -> Result<Option<IssueRecord>, AppError> {
        if !valid_key(issue_id) {
            return Ok(None);
        }
        self.get(&node(ISSUES, issue_id)).await
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, AppError> {
        let candidates: Vec<IssueRecord> = match &filter.student_id {
            Some(student_id) => self.query(ISSUES, "student_id", student_id).await?,
            None => self.all(ISSUES).await?,
        };
        let mut issues: Vec<IssueRecord> =
            candidates.into_iter().filter(|i| filter.matches(i)).collect();
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
        let path = node(ISSUES, issue_id);
        if !valid_key(issue_id) || !self.exists(&path).await? {
            return Ok(false);
        }
        let mut fields = Map::new();
        put_field(&mut fields, "status", status)?;
        if let Some(response) = response {
            put_field(&mut fields, "response", response)?;
        }
        put_field(&mut fields, "updated_at", at)?;
        self.patch(&path, fields).await?;
        Ok(true)
    }
}
