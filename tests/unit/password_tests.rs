// ============================
// tests/unit/password_tests.rs
// ============================
//! Unit tests for password hashing and policy
use backend_lib::auth::password::ensure_confirmed;
use backend_lib::auth::{validate_password_strength, ScryptHasher};
use backend_lib::config::{HashingSettings, PasswordRequirements};
use backend_lib::error::AppError;

fn hasher() -> ScryptHasher {
    ScryptHasher::new(&HashingSettings { log_n: 4, r: 8, p: 1 }).unwrap()
}

#[test]
fn test_password_hashing_and_verification() {
    let hasher = hasher();
    let hash = hasher.hash("Secret123").unwrap();

    assert_ne!(hash, "Secret123");
    assert!(hash.starts_with("$scrypt$"));
    assert!(hasher.verify(&hash, "Secret123"));
    assert!(!hasher.verify(&hash, "secret123"));
    assert!(!hasher.verify(&hash, ""));
}

#[test]
fn test_same_password_gets_a_fresh_salt() {
    let hasher = hasher();
    let a = hasher.hash("Secret123").unwrap();
    let b = hasher.hash("Secret123").unwrap();
    assert_ne!(a, b);
    assert!(hasher.verify(&a, "Secret123"));
    assert!(hasher.verify(&b, "Secret123"));
}

#[test]
fn test_malformed_hash_never_verifies() {
    let hasher = hasher();
    assert!(!hasher.verify("not-a-phc-string", "Secret123"));
    assert!(!hasher.verify("", ""));
}

#[test]
fn test_hashes_from_other_parameters_still_verify() {
    let old = ScryptHasher::new(&HashingSettings { log_n: 5, r: 8, p: 1 }).unwrap();
    let hash = old.hash("Secret123").unwrap();
    assert!(hasher().verify(&hash, "Secret123"));
}

#[test]
fn test_password_strength_validation() {
    let requirements = PasswordRequirements::default();

    assert!(validate_password_strength("Secret123", &requirements).is_ok());
    assert!(matches!(
        validate_password_strength("short", &requirements),
        Err(AppError::WeakPassword(_))
    ));
    assert!(validate_password_strength(&"x".repeat(129), &requirements).is_err());

    let strict = PasswordRequirements {
        min_length: 8,
        require_uppercase: true,
        require_lowercase: true,
        require_digit: true,
        require_special: true,
    };
    assert!(validate_password_strength("Secret12!", &strict).is_ok());
    assert!(validate_password_strength("secret12!", &strict).is_err());
    assert!(validate_password_strength("SECRET12!", &strict).is_err());
    assert!(validate_password_strength("Secretxx!", &strict).is_err());
    assert!(validate_password_strength("Secret123", &strict).is_err());
}

#[test]
fn test_confirmation_must_match() {
    assert!(ensure_confirmed("Secret123", "Secret123").is_ok());
    assert!(matches!(
        ensure_confirmed("Secret123", "Secret124"),
        Err(AppError::PasswordMismatch)
    ));
}
