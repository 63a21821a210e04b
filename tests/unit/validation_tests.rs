// ==============================
// tests/unit/validation_tests.rs
// ==============================
use backend_lib::validation::{
    validate_email, validate_email_domain, validate_issue, validate_phone, validate_student_id,
    validate_username,
};

#[test]
fn test_registration_fields_are_normalized() {
    assert_eq!(validate_username("  Alice ").unwrap(), "alice");
    assert_eq!(
        validate_email("Alice@KTU.edu.gh").unwrap(),
        "alice@ktu.edu.gh"
    );
    assert_eq!(validate_student_id("cs20230001").unwrap(), "CS20230001");
    assert_eq!(validate_phone("+233 20 123 4567").unwrap(), "+233201234567");
}

#[test]
fn test_bad_registration_fields() {
    assert!(validate_username("al").is_err());
    assert!(validate_username("alice smith").is_err());
    assert!(validate_email("alice.ktu.edu.gh").is_err());
    assert!(validate_student_id("X").is_err());
    assert!(validate_phone("call me").is_err());
}

#[test]
fn test_email_domain() {
    assert!(validate_email_domain("alice@ktu.edu.gh", "@ktu.edu.gh").is_ok());
    assert!(validate_email_domain("alice@gmail.com", "@ktu.edu.gh").is_err());
    // lookalike domains do not pass
    assert!(validate_email_domain("alice@evilktu.edu.gh", "@ktu.edu.gh").is_err());
    assert!(validate_email_domain("alice@gmail.com", "").is_ok());
}

#[test]
fn test_issue_category_must_be_known() {
    let categories = vec!["academic".to_string(), "welfare".to_string()];
    let issue = validate_issue("  Missing grade ", "Academic", "My CSC 301 grade is blank", &categories)
        .unwrap();
    assert_eq!(issue.subject, "Missing grade");
    assert_eq!(issue.category, "academic");
    assert!(validate_issue("Subject", "parking", "Message", &categories).is_err());
    assert!(validate_issue("", "academic", "Message", &categories).is_err());
}
