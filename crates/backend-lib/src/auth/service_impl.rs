use std::sync::Arc;

use async_trait::async_trait;
use concern_common::{
    CreateSubadminRequest, RegisterRequest, RegisterResponse, ResetChannel, Role,
    UpdateProfileRequest, UserView,
};
use metrics::counter;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::password::{ensure_confirmed, validate_password_strength, ScryptHasher};
use super::roles::{require_role, ADMINS, SUPAADMIN_ONLY};
use super::tokens::TokenService;
use super::{AuthService, LoginOutcome, NewAccount, Session, SessionManager};
use crate::clock::Clock;
use crate::config::{PasswordRequirements, RegistrationPolicy, Settings};
use crate::error::AppError;
use crate::metrics::{
    LOGIN_FAILED, LOGIN_SUCCEEDED, PASSWORD_CHANGED, PASSWORD_RESET, USER_REGISTERED,
};
use crate::models::{Profile, ProfileUpdate, TokenPurpose, UserLookup, UserRecord};
use crate::notify::{deliver, templates, Notifier, Recipient};
use crate::storage::{PasswordChange, Store};
use crate::validation;

pub struct DefaultAuth {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<SessionManager>,
    tokens: TokenService,
    hasher: ScryptHasher,
    registration: RegistrationPolicy,
    password_requirements: PasswordRequirements,
    public_base_url: String,
}

impl DefaultAuth {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<SessionManager>,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            tokens: TokenService::new(store.clone(), clock.clone(), settings.tokens.clone()),
            hasher: ScryptHasher::new(&settings.password_hashing)?,
            store,
            clock,
            notifier,
            sessions,
            registration: settings.registration.clone(),
            password_requirements: settings.password_requirements.clone(),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Token lifecycle shared with this service
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// scrypt is CPU-bound; keep it off the async workers
    async fn hash(&self, plain: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let mut plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash_secure(&mut plain))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
    }

    /// Verify against `hash`, or against the dummy hash when there is none
    async fn verify(&self, hash: Option<String>, plain: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let plain = Zeroizing::new(plain.to_owned());
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.verify(&hash, &plain),
            None => hasher.verify_dummy(&plain),
        })
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }

    fn check_domain(&self, email: &str) -> Result<(), AppError> {
        validation::validate_email_domain(email, &self.registration.allowed_email_domain)?;
        Ok(())
    }

    async fn send_verification_code(&self, user: &UserRecord) -> Result<(), AppError> {
        let token = self
            .tokens
            .issue(&user.id, TokenPurpose::EmailVerification)
            .await?;
        if user.email.is_empty() {
            warn!(user_id = %user.id, "no email address to send the verification code to");
            return Ok(());
        }
        let ttl = self.tokens.ttl(TokenPurpose::EmailVerification)?.num_minutes();
        let msg = templates::verification_email(&user.display_name(), &token.value, ttl);
        let to = Recipient::email(&user.email, user.display_name());
        deliver(self.notifier.as_ref(), &to, &msg.subject, &msg.body).await;
        Ok(())
    }

    fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password/{}", self.public_base_url, token)
    }
}

fn profile_from_request(request: &RegisterRequest) -> Result<Profile, AppError> {
    let optional = |field: &'static str, value: &Option<String>| -> Result<String, AppError> {
        match value {
            Some(v) => Ok(validation::validate_profile_field(field, v)?),
            None => Ok(String::new()),
        }
    };
    let phone = match request.phone.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => validation::validate_phone(p)?,
        _ => String::new(),
    };
    Ok(Profile {
        first_name: validation::validate_name("first name", &request.first_name)?,
        last_name: validation::validate_name("last name", &request.last_name)?,
        phone,
        gender: validation::validate_gender(&request.gender)?,
        student_id: validation::validate_student_id(&request.student_id)?,
        level: validation::validate_profile_field("level", &request.level)?,
        department: optional("department", &request.department)?,
        program: optional("program", &request.program)?,
    })
}

fn profile_update_from_request(request: UpdateProfileRequest) -> Result<ProfileUpdate, AppError> {
    let phone = match request.phone {
        Some(p) if p.trim().is_empty() => Some(String::new()),
        Some(p) => Some(validation::validate_phone(&p)?),
        None => None,
    };
    Ok(ProfileUpdate {
        first_name: request
            .first_name
            .map(|v| validation::validate_name("first name", &v))
            .transpose()?,
        last_name: request
            .last_name
            .map(|v| validation::validate_name("last name", &v))
            .transpose()?,
        phone,
        level: request
            .level
            .map(|v| validation::validate_profile_field("level", &v))
            .transpose()?,
        department: request
            .department
            .map(|v| validation::validate_profile_field("department", &v))
            .transpose()?,
        program: request
            .program
            .map(|v| validation::validate_profile_field("program", &v))
            .transpose()?,
    })
}

/// Reset failures are reported as one error so callers learn nothing about
/// why a token was refused
fn as_invalid_token(err: AppError) -> AppError {
    match err {
        AppError::TokenNotFound | AppError::TokenExpired | AppError::TokenAlreadyUsed => {
            AppError::InvalidToken
        },
        other => other,
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    #[instrument(skip(self, account), fields(username = %account.username, role = %account.role))]
    async fn register(&self, account: NewAccount) -> Result<UserRecord, AppError> {
        let username = validation::validate_username(&account.username)?;
        let email = if account.email.trim().is_empty() {
            String::new()
        } else {
            validation::validate_email(&account.email)?
        };
        validate_password_strength(&account.password, &self.password_requirements)?;

        let now = self.clock.now();
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: self.hash(&account.password).await?,
            role: account.role,
            email,
            email_verified: account.email_verified,
            profile: account.profile,
            created_at: now,
            updated_at: None,
            password_reset_at: None,
            verified_at: account.email_verified.then_some(now),
        };
        self.store.insert_user(&user).await?;

        counter!(USER_REGISTERED, "role" => user.role.as_str()).increment(1);
        info!(user_id = %user.id, "account created");
        Ok(user)
    }

    async fn register_student(
        &self,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, AppError> {
        let password = Zeroizing::new(request.password.clone());
        ensure_confirmed(&password, &request.confirm_password)?;
        let email = validation::validate_email(&request.email)?;
        self.check_domain(&email)?;
        let profile = profile_from_request(&request)?;

        let verification_required = self.registration.require_email_verification;
        let mut account = NewAccount::new(&request.username, password.as_str(), Role::Student)
            .with_email(email)
            .with_profile(profile);
        account.email_verified = !verification_required;

        let user = self.register(account).await?;
        if verification_required {
            self.send_verification_code(&user).await?;
        }
        Ok(RegisterResponse {
            user_id: user.id,
            verification_required,
        })
    }

    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        let username = username.trim().to_lowercase();
        let user = if username.is_empty() {
            None
        } else {
            self.store.find_user(UserLookup::Username(&username)).await?
        };
        let matched = self
            .verify(user.as_ref().map(|u| u.password_hash.clone()), password)
            .await?;
        Ok(user.filter(|_| matched))
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let Some(user) = self.verify_credentials(username, password).await? else {
            counter!(LOGIN_FAILED).increment(1);
            return Err(AppError::InvalidCredentials);
        };
        if user.role == Role::Student
            && self.registration.require_email_verification
            && !user.email_verified
        {
            return Err(AppError::EmailNotVerified);
        }
        let (token, session) = self.sessions.create(&user).await;
        counter!(LOGIN_SUCCEEDED, "role" => user.role.as_str()).increment(1);
        info!(user_id = %user.id, "logged in");
        Ok(LoginOutcome {
            token,
            session,
            user,
        })
    }

    async fn logout(&self, session_token: &str) -> bool {
        self.sessions.revoke(session_token).await
    }

    #[instrument(skip(self, current_password, new_password))]
    async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.get_user(user_id).await?;
        if self
            .verify_credentials(&user.username, current_password)
            .await?
            .is_none()
        {
            return Err(AppError::InvalidCredentials);
        }
        validate_password_strength(new_password, &self.password_requirements)?;
        let hash = self.hash(new_password).await?;
        let now = self.clock.now();
        if !self
            .store
            .update_password_hash(&user.id, &hash, PasswordChange::Changed, now)
            .await?
        {
            return Err(AppError::NotFound("user".to_string()));
        }
        counter!(PASSWORD_CHANGED).increment(1);
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), AppError> {
        validate_password_strength(new_password, &self.password_requirements)?;
        let hash = self.hash(new_password).await?;
        let user_id = self
            .tokens
            .validate_and_consume(reset_token, TokenPurpose::PasswordReset)
            .await
            .map_err(as_invalid_token)?;
        let now = self.clock.now();
        if !self
            .store
            .update_password_hash(&user_id, &hash, PasswordChange::Reset, now)
            .await?
        {
            return Err(AppError::InvalidToken);
        }
        let revoked = self.sessions.revoke_user(&user_id).await;
        counter!(PASSWORD_RESET).increment(1);
        info!(%user_id, revoked_sessions = revoked, "password reset");
        Ok(())
    }

    async fn check_reset_token(&self, reset_token: &str) -> Result<bool, AppError> {
        match self
            .tokens
            .peek(reset_token, TokenPurpose::PasswordReset)
            .await
        {
            Ok(_) => Ok(true),
            Err(AppError::TokenNotFound | AppError::TokenExpired | AppError::TokenAlreadyUsed) => {
                Ok(false)
            },
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, code))]
    async fn verify_email(&self, user_id: &str, code: &str) -> Result<(), AppError> {
        if self.store.find_user(UserLookup::Id(user_id)).await?.is_none() {
            return Err(AppError::TokenNotFound);
        }
        self.tokens
            .consume_for_user(code, TokenPurpose::EmailVerification, user_id)
            .await?;
        self.store
            .mark_email_verified(user_id, self.clock.now())
            .await?;
        info!(%user_id, "email verified");
        Ok(())
    }

    async fn resend_verification(&self, user_id: &str) -> Result<(), AppError> {
        let user = self.get_user(user_id).await?;
        if user.email_verified {
            return Err(AppError::InvalidInput("email already verified".to_string()));
        }
        self.send_verification_code(&user).await
    }

    #[instrument(skip(self, contact, student_id))]
    async fn request_password_reset(
        &self,
        channel: ResetChannel,
        contact: &str,
        student_id: &str,
    ) -> Result<(), AppError> {
        // Contacts are not unique; the student id is, so it selects the account
        let contact = match channel {
            ResetChannel::Email => validation::validate_email(contact)?,
            ResetChannel::Phone => validation::validate_phone(contact)?,
        };
        let student_id = validation::validate_student_id(student_id)?;
        let user = self
            .store
            .find_user(UserLookup::StudentId(&student_id))
            .await?
            .filter(|u| match channel {
                ResetChannel::Email => u.email.eq_ignore_ascii_case(&contact),
                ResetChannel::Phone => u.profile.phone == contact,
            });
        let Some(user) = user else {
            info!("password reset requested for unknown contact");
            return Ok(());
        };

        let token = self
            .tokens
            .issue(&user.id, TokenPurpose::PasswordReset)
            .await?;
        let link = self.reset_link(&token.value);
        let ttl = self.tokens.ttl(TokenPurpose::PasswordReset)?.num_minutes();
        let (to, msg) = match channel {
            ResetChannel::Email => (
                Recipient::email(&user.email, user.display_name()),
                templates::reset_email(&user.display_name(), &link, ttl),
            ),
            ResetChannel::Phone => (
                Recipient::Phone(user.profile.phone.clone()),
                templates::reset_sms(&link),
            ),
        };
        deliver(self.notifier.as_ref(), &to, &msg.subject, &msg.body).await;
        info!(user_id = %user.id, "password reset token issued");
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<UserRecord, AppError> {
        self.store
            .find_user(UserLookup::Id(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: UpdateProfileRequest,
    ) -> Result<UserRecord, AppError> {
        let update = profile_update_from_request(update)?;
        if update.is_empty() {
            return Err(AppError::InvalidInput("nothing to update".to_string()));
        }
        if !self
            .store
            .update_profile(user_id, &update, self.clock.now())
            .await?
        {
            return Err(AppError::NotFound("user".to_string()));
        }
        self.get_user(user_id).await
    }

    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id))]
    async fn create_subadmin(
        &self,
        actor: &Session,
        request: CreateSubadminRequest,
    ) -> Result<UserRecord, AppError> {
        require_role(actor, SUPAADMIN_ONLY)?;
        let email = validation::validate_email(&request.email)?;
        self.check_domain(&email)?;
        let profile = Profile {
            first_name: validation::sanitize_string(&request.first_name),
            last_name: validation::sanitize_string(&request.last_name),
            ..Profile::default()
        };
        let password = Zeroizing::new(request.password);
        self.register(
            NewAccount::new(request.username, password.as_str(), Role::Subadmin)
                .with_email(email)
                .with_profile(profile)
                .verified(),
        )
        .await
    }

    async fn list_users(&self, actor: &Session) -> Result<Vec<UserView>, AppError> {
        require_role(actor, ADMINS)?;
        Ok(self
            .store
            .list_users()
            .await?
            .iter()
            .map(UserRecord::to_view)
            .collect())
    }

    async fn seed_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AppError> {
        let normalized = validation::validate_username(username)?;
        match self.store.find_user(UserLookup::Username(&normalized)).await? {
            Some(existing) if existing.role == Role::Supaadmin => {
                validate_password_strength(password, &self.password_requirements)?;
                let hash = self.hash(password).await?;
                self.store
                    .update_password_hash(
                        &existing.id,
                        &hash,
                        PasswordChange::Changed,
                        self.clock.now(),
                    )
                    .await?;
                info!(user_id = %existing.id, "super-admin password reset");
                self.get_user(&existing.id).await
            },
            Some(_) => Err(AppError::DuplicateUsername),
            None => {
                self.register(
                    NewAccount::new(normalized, password, Role::Supaadmin)
                        .with_email(email)
                        .verified(),
                )
                .await
            },
        }
    }
}
