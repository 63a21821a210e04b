// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use rand::rngs::OsRng;
use scrypt::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use zeroize::Zeroize;

use crate::config::{HashingSettings, PasswordRequirements};
use crate::error::AppError;

/// Upper bound on accepted password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// scrypt hasher producing PHC strings (`$scrypt$ln=..,r=..,p=..$salt$hash`).
///
/// Verification reads the cost parameters from the stored hash, so hashes
/// created under older settings keep verifying after a settings change.
#[derive(Clone)]
pub struct ScryptHasher {
    params: Params,
    /// Verified against when the user does not exist, so a miss costs the
    /// same as a wrong password.
    dummy_hash: String,
}

impl ScryptHasher {
    pub fn new(settings: &HashingSettings) -> anyhow::Result<Self> {
        let params = Params::new(settings.log_n, settings.r, settings.p, Params::RECOMMENDED_LEN)
            .map_err(|e| anyhow::anyhow!("invalid scrypt parameters: {e}"))?;
        let dummy_hash = hash_with(params, "dummy-password-never-matches")
            .map_err(|e| anyhow::anyhow!("failed to prepare dummy hash: {e}"))?;
        Ok(Self { params, dummy_hash })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<String, AppError> {
        hash_with(self.params, plain)
    }

    /// Verify a password against a stored hash. Unparseable hashes never match.
    pub fn verify(&self, hash: &str, plain: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Scrypt.verify_password(plain.as_bytes(), &parsed).is_ok()
    }

    /// Burn the same work as a real verification and report a mismatch
    pub fn verify_dummy(&self, plain: &str) -> bool {
        let _ = self.verify(&self.dummy_hash, plain);
        false
    }

    /// Hash then wipe the plaintext
    pub fn hash_secure(&self, plain: &mut String) -> Result<String, AppError> {
        let hash = self.hash(plain);
        plain.zeroize();
        hash
    }
}

fn hash_with(params: Params, plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against the configured policy
pub fn validate_password_strength(
    password: &str,
    requirements: &PasswordRequirements,
) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < requirements.min_length {
        return Err(AppError::WeakPassword(format!(
            "must be at least {} characters",
            requirements.min_length
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::WeakPassword(format!(
            "cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return Err(AppError::WeakPassword(
            "must contain an uppercase letter".to_string(),
        ));
    }
    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return Err(AppError::WeakPassword(
            "must contain a lowercase letter".to_string(),
        ));
    }
    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::WeakPassword("must contain a digit".to_string()));
    }
    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(AppError::WeakPassword(
            "must contain a special character".to_string(),
        ));
    }
    Ok(())
}

/// `PasswordMismatch` unless the confirmation equals the password
pub fn ensure_confirmed(password: &str, confirm: &str) -> Result<(), AppError> {
    if password == confirm {
        Ok(())
    } else {
        Err(AppError::PasswordMismatch)
    }
}
