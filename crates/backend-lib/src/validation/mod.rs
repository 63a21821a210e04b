// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for registration, profile and issue requests.
//!
//! Validators return the normalized value (trimmed, case-folded where the
//! store compares case-insensitively) so callers persist exactly what was
//! checked.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_NAME_LENGTH: usize = 60;
const MAX_SUBJECT_LENGTH: usize = 150;
const MAX_MESSAGE_LENGTH: usize = 5000;
const MAX_PROFILE_FIELD_LENGTH: usize = 100;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap());
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
// Index numbers look like `BC/ITS/22/001` or `CS1001`
static STUDENT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9/-]{3,19}$").unwrap());
static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").unwrap());
static SESSION_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{43}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid student ID: {0}")]
    InvalidStudentId(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid issue: {0}")]
    InvalidIssue(String),

    #[error("Invalid session token")]
    InvalidSessionToken,
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a username; returns it trimmed and lower-cased
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim().to_lowercase();
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !USERNAME_REGEX.is_match(&username) {
        return Err(ValidationError::InvalidUsername(
            "may contain only letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(username)
}

/// Validate an email address; returns it trimmed and lower-cased
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail("must not be empty".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }
    if !EMAIL_REGEX.is_match(&email) {
        return Err(ValidationError::InvalidEmail(
            "not a valid email address".to_string(),
        ));
    }
    Ok(email)
}

/// Check an already-normalized email against the required domain suffix.
/// An empty `domain` accepts everything.
pub fn validate_email_domain(email: &str, domain: &str) -> ValidationResult<()> {
    if domain.is_empty() || email.ends_with(&domain.to_lowercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "only {domain} email addresses can register"
        )))
    }
}

/// Validate a student index number; returns it trimmed and upper-cased
pub fn validate_student_id(student_id: &str) -> ValidationResult<String> {
    let student_id = student_id.trim().to_uppercase();
    if !STUDENT_ID_REGEX.is_match(&student_id) {
        return Err(ValidationError::InvalidStudentId(
            "expected 4 to 20 letters, digits, '/' or '-'".to_string(),
        ));
    }
    Ok(student_id)
}

/// Validate a phone number; spaces are stripped
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    if !PHONE_REGEX.is_match(&phone) {
        return Err(ValidationError::InvalidPhone(
            "expected 7 to 15 digits with an optional leading '+'".to_string(),
        ));
    }
    Ok(phone)
}

/// Gender is recorded as `M` or `F`
pub fn validate_gender(gender: &str) -> ValidationResult<String> {
    match gender.trim().to_ascii_lowercase().as_str() {
        "m" | "male" => Ok("M".to_string()),
        "f" | "female" => Ok("F".to_string()),
        _ => Err(ValidationError::InvalidField {
            field: "gender",
            reason: "must be M or F".to_string(),
        }),
    }
}

/// Required personal name (first or last)
pub fn validate_name(field: &'static str, name: &str) -> ValidationResult<String> {
    let name = sanitize_string(name);
    if name.is_empty() {
        return Err(ValidationError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidField {
            field,
            reason: format!("cannot exceed {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(name)
}

/// Free-form profile field such as level, department or program
pub fn validate_profile_field(field: &'static str, value: &str) -> ValidationResult<String> {
    let value = sanitize_string(value);
    if value.chars().count() > MAX_PROFILE_FIELD_LENGTH {
        return Err(ValidationError::InvalidField {
            field,
            reason: format!("cannot exceed {MAX_PROFILE_FIELD_LENGTH} characters"),
        });
    }
    Ok(value)
}

/// Sanitized issue fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueInput {
    pub subject: String,
    pub category: String,
    pub message: String,
}

/// Validate an issue submission against the configured categories
pub fn validate_issue(
    subject: &str,
    category: &str,
    message: &str,
    categories: &[String],
) -> ValidationResult<IssueInput> {
    let subject = sanitize_string(subject);
    let message = sanitize_string(message);
    let category = category.trim().to_lowercase();

    if subject.is_empty() || message.is_empty() {
        return Err(ValidationError::InvalidIssue(
            "subject and message are required".to_string(),
        ));
    }
    if subject.chars().count() > MAX_SUBJECT_LENGTH {
        return Err(ValidationError::InvalidIssue(format!(
            "subject cannot exceed {MAX_SUBJECT_LENGTH} characters"
        )));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::InvalidIssue(format!(
            "message cannot exceed {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    if !categories.iter().any(|c| c.eq_ignore_ascii_case(&category)) {
        return Err(ValidationError::InvalidIssue(format!(
            "unknown category '{category}'"
        )));
    }
    Ok(IssueInput {
        subject,
        category,
        message,
    })
}

/// Shape check for bearer session tokens (32 bytes, base64url, no padding)
pub fn validate_session_token(token: &str) -> ValidationResult<&str> {
    if SESSION_TOKEN_REGEX.is_match(token) {
        Ok(token)
    } else {
        Err(ValidationError::InvalidSessionToken)
    }
}

/// Trim and drop control characters other than newlines and tabs
pub fn sanitize_string(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
