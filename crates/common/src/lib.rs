// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between portal clients and the server.
//! This module defines the JSON request/response bodies and the
//! role and status vocabularies shared by both sides.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identifier
pub type UserId = String;

/// Opaque issue identifier
pub type IssueId = String;

/// Account role.
///
/// Roles form a flat set: no role implies another's permissions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits and follows up on issues
    Student,
    /// Triages and resolves issues
    Subadmin,
    /// Administers accounts and the system
    Supaadmin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Subadmin, Role::Supaadmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Subadmin => "subadmin",
            Role::Supaadmin => "supaadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "subadmin" => Ok(Role::Subadmin),
            "supaadmin" => Ok(Role::Supaadmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Lifecycle status of an issue
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Resolved,
    /// Soft-deleted; hidden from listings
    Deleted,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(IssueStatus::Pending),
            "in_progress" => Ok(IssueStatus::InProgress),
            "resolved" => Ok(IssueStatus::Resolved),
            "deleted" => Ok(IssueStatus::Deleted),
            other => Err(format!("unknown issue status: {other}")),
        }
    }
}

/// Where a password reset link should be delivered
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetChannel {
    #[default]
    Email,
    Phone,
}

/// Student self-registration
/// # Fields
/// * `username` - Login name, matched case-insensitively
/// * `email` - Must belong to the institutional domain
/// * `student_id` - Index number, unique per student
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub level: String,
    pub gender: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterResponse {
    pub user_id: UserId,
    /// True when a verification code was issued and must be confirmed before login
    pub verification_required: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyEmailRequest {
    pub user_id: UserId,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResendVerificationRequest {
    pub user_id: UserId,
}

/// Request a password reset link
/// # Fields
/// * `contact` - Email address or phone number, depending on `channel`
/// * `student_id` - Index number used as a second factor for the lookup
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub channel: ResetChannel,
    pub contact: String,
    pub student_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetTokenStatus {
    pub valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Partial profile update; absent fields are left untouched
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
}

/// Public projection of a user account. Never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub email: String,
    pub email_verified: bool,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub gender: String,
    pub student_id: String,
    pub level: String,
    pub department: String,
    pub program: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateSubadminRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitIssueRequest {
    pub subject: String,
    pub category: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateIssueStatusRequest {
    pub status: IssueStatus,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssueView {
    pub id: IssueId,
    pub student_id: UserId,
    /// Resolved for admin listings; `None` when the student record is gone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_username: Option<String>,
    pub subject: String,
    pub category: String,
    pub message: String,
    pub status: IssueStatus,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Counts shown on the admin statistics page
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub users_by_role: BTreeMap<Role, usize>,
    pub issues_by_status: BTreeMap<IssueStatus, usize>,
}

/// Generic acknowledgement body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
