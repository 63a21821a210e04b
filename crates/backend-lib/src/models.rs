// ============================
// backend-lib/src/models.rs
// ============================
//! Records persisted by the [`Store`](crate::storage::Store) adapters.
use chrono::{DateTime, Utc};
use concern_common::{IssueId, IssueStatus, IssueView, Role, UserId, UserView};
use serde::{Deserialize, Serialize};

/// Profile fields collected at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub gender: String,
    /// Index number, stored upper-cased
    pub student_id: String,
    pub level: String,
    pub department: String,
    pub program: String,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Stored lower-cased; lookups are case-insensitive
    pub username: String,
    /// scrypt PHC string
    pub password_hash: String,
    pub role: Role,
    /// Stored lower-cased
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn to_view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
            email: self.email.clone(),
            email_verified: self.email_verified,
            first_name: self.profile.first_name.clone(),
            last_name: self.profile.last_name.clone(),
            phone: self.profile.phone.clone(),
            gender: self.profile.gender.clone(),
            student_id: self.profile.student_id.clone(),
            level: self.profile.level.clone(),
            department: self.profile.department.clone(),
            program: self.profile.program.clone(),
            created_at: self.created_at,
        }
    }

    /// Name used in greetings; falls back to the username
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.profile.first_name, self.profile.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

/// Key used to find a single user
#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(&'a str),
    /// Matched case-insensitively
    Username(&'a str),
    /// Matched case-insensitively
    Email(&'a str),
    /// Matched case-insensitively
    StudentId(&'a str),
    Phone(&'a str),
}

/// Partial profile change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub level: Option<String>,
    pub department: Option<String>,
    pub program: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.level.is_none()
            && self.department.is_none()
            && self.program.is_none()
    }

    pub fn apply(&self, profile: &mut Profile) {
        let fields = [
            (&self.first_name, &mut profile.first_name),
            (&self.last_name, &mut profile.last_name),
            (&self.phone, &mut profile.phone),
            (&self.level, &mut profile.level),
            (&self.department, &mut profile.department),
            (&self.program, &mut profile.program),
        ];
        for (update, field) in fields {
            if let Some(value) = update {
                field.clone_from(value);
            }
        }
    }
}

/// What a token authorizes. A token never validates for another purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// 6-digit code confirming a registration email
    EmailVerification,
    /// 32-character secret authorizing a password reset
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_verification" => Some(TokenPurpose::EmailVerification),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

/// A single-use, time-limited secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub user_id: UserId,
    pub value: String,
    pub purpose: TokenPurpose,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub used_at: Option<DateTime<Utc>>,
}

/// A student-submitted concern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub student_id: UserId,
    pub subject: String,
    pub category: String,
    pub message: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub response: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueRecord {
    pub fn to_view(&self, student_username: Option<String>) -> IssueView {
        IssueView {
            id: self.id.clone(),
            student_id: self.student_id.clone(),
            student_username,
            subject: self.subject.clone(),
            category: self.category.clone(),
            message: self.message.clone(),
            status: self.status,
            response: self.response.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Selection for issue listings
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub student_id: Option<UserId>,
    pub status: Option<IssueStatus>,
    /// Soft-deleted issues are hidden unless set
    pub include_deleted: bool,
}

impl IssueFilter {
    pub fn matches(&self, issue: &IssueRecord) -> bool {
        if !self.include_deleted && issue.status == IssueStatus::Deleted {
            return false;
        }
        if let Some(student_id) = &self.student_id {
            if &issue.student_id != student_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if issue.status != status {
                return false;
            }
        }
        true
    }
}
