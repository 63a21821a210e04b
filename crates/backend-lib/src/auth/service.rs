use async_trait::async_trait;
use concern_common::{
    CreateSubadminRequest, RegisterRequest, RegisterResponse, ResetChannel, Role,
    UpdateProfileRequest, UserView,
};

use super::Session;
use crate::error::AppError;
use crate::models::{Profile, UserRecord};

/// Everything needed to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub email: String,
    pub profile: Profile,
    /// Accounts created by administrators skip email verification
    pub email_verified: bool,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
            email: String::new(),
            profile: Profile::default(),
            email_verified: false,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn verified(mut self) -> Self {
        self.email_verified = true;
        self
    }
}

/// A successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub session: Session,
    pub user: UserRecord,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account. Fails with `DuplicateUsername`, `DuplicateStudentId`
    /// or `DuplicateEmail` when the value is taken.
    async fn register(&self, account: NewAccount) -> Result<UserRecord, AppError>;

    /// Student self-registration: validates the form, creates the account and
    /// sends a verification code when the policy requires one.
    async fn register_student(&self, request: RegisterRequest)
        -> Result<RegisterResponse, AppError>;

    /// `None` on any mismatch, whether or not the user exists
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AppError>;

    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError>;

    async fn logout(&self, session_token: &str) -> bool;

    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError>;

    /// Consume a reset token and, only then, replace the password hash
    async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), AppError>;

    /// Whether a reset token would currently be accepted
    async fn check_reset_token(&self, reset_token: &str) -> Result<bool, AppError>;

    async fn verify_email(&self, user_id: &str, code: &str) -> Result<(), AppError>;

    async fn resend_verification(&self, user_id: &str) -> Result<(), AppError>;

    /// Always succeeds for well-formed input, matched or not
    async fn request_password_reset(
        &self,
        channel: ResetChannel,
        contact: &str,
        student_id: &str,
    ) -> Result<(), AppError>;

    async fn get_user(&self, user_id: &str) -> Result<UserRecord, AppError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: UpdateProfileRequest,
    ) -> Result<UserRecord, AppError>;

    async fn create_subadmin(
        &self,
        actor: &Session,
        request: CreateSubadminRequest,
    ) -> Result<UserRecord, AppError>;

    async fn list_users(&self, actor: &Session) -> Result<Vec<UserView>, AppError>;

    /// Create a super-admin, or reset the password of an existing one
    async fn seed_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AppError>;
}
