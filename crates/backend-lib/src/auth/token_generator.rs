// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
/** Secure random values for sessions, verification codes and reset tokens.
All values come from the OS entropy source. */
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Length of a password reset token
pub const RESET_TOKEN_LENGTH: usize = 32;

/// Number of digits in an email verification code
pub const VERIFICATION_CODE_DIGITS: usize = 6;

/** Generate a session token.
# Returns
32 random bytes, base64 URL-safe encoded without padding (43 characters) */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/// Generate a base64url token from `bytes` random bytes
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Six decimal digits, never starting with zero (100000..=999999)
pub fn generate_verification_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

/// 32 ASCII alphanumerics
pub fn generate_reset_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
