// ==================================
// tests/integration/auth_flow_tests.rs
// ==================================
//! Account, verification and reset flows through the auth service
use std::sync::Arc;

use backend_lib::{
    auth::{AuthService, NewAccount, TokenService},
    clock::{Clock, ManualClock},
    config::TokenSettings,
    error::AppError,
    models::{TokenPurpose, TokenRecord, UserLookup},
    storage::{MemoryStore, SqliteStore, Store},
};
use chrono::Duration;
use concern_common::{ResetChannel, Role};
use rand::{distributions::Alphanumeric, Rng};
use tempfile::tempdir;

use crate::test_utils::{auth_service, student_form, RecordingNotifier};

struct Fixture {
    store: Arc<dyn Store>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
    auth: backend_lib::auth::DefaultAuth,
}

fn fixture() -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let notifier = Arc::new(RecordingNotifier::default());
    let auth = auth_service(store.clone(), clock.clone(), notifier.clone());
    Fixture {
        store,
        clock,
        notifier,
        auth,
    }
}

async fn stored_hash(store: &dyn Store, user_id: &str) -> String {
    store
        .find_user(UserLookup::Id(user_id))
        .await
        .unwrap()
        .unwrap()
        .password_hash
}

#[tokio::test]
async fn test_register_then_verify_credentials() {
    let f = fixture();
    let user = f
        .auth
        .register(NewAccount::new("alice", "Secret123", Role::Student))
        .await
        .unwrap();
    assert_ne!(user.password_hash, "Secret123");

    let found = f
        .auth
        .verify_credentials("alice", "Secret123")
        .await
        .unwrap()
        .expect("credentials should match");
    assert_eq!(found.id, user.id);
    assert_eq!(found.username, "alice");
    assert_eq!(found.role, Role::Student);

    // usernames match case-insensitively
    assert!(f
        .auth
        .verify_credentials("ALICE", "Secret123")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let f = fixture();
    f.auth
        .register_student(student_form("kofi", "CS20230001"))
        .await
        .unwrap();

    let err = f
        .auth
        .register_student(student_form("KOFI", "CS20230002"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateUsername));

    let err = f
        .auth
        .register_student(student_form("kofi2", "cs20230001"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateStudentId));
}

#[tokio::test]
async fn test_registration_outside_domain_is_rejected() {
    let f = fixture();
    let mut form = student_form("yaw", "CS20230003");
    form.email = "yaw@gmail.com".to_string();
    let err = f.auth.register_student(form).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(f.store.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mismatched_passwords_never_verify() {
    let f = fixture();
    f.auth
        .register(NewAccount::new("alice", "Secret123", Role::Student))
        .await
        .unwrap();

    let auth = Arc::new(f.auth);
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10_000 {
        let auth = auth.clone();
        let len = rand::thread_rng().gen_range(0..24);
        let guess: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        if guess == "Secret123" {
            continue;
        }
        tasks.spawn(async move { auth.verify_credentials("alice", &guess).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().unwrap().is_none());
    }
}

#[tokio::test]
async fn test_verification_code_is_single_use() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("ama", "CS20230010"))
        .await
        .unwrap();
    assert!(response.verification_required);

    let now = f.clock.now();
    f.store
        .insert_token(&TokenRecord {
            id: "fixed-code".to_string(),
            user_id: response.user_id.clone(),
            value: "482913".to_string(),
            purpose: TokenPurpose::EmailVerification,
            created_at: now,
            expires_at: now + Duration::minutes(15),
            used: false,
            used_at: None,
        })
        .await
        .unwrap();

    // unverified students cannot log in
    let err = f.auth.login("ama", "Secret123").await.unwrap_err();
    assert!(matches!(err, AppError::EmailNotVerified));

    f.auth
        .verify_email(&response.user_id, "482913")
        .await
        .unwrap();
    let err = f
        .auth
        .verify_email(&response.user_id, "482913")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenAlreadyUsed));

    let outcome = f.auth.login("ama", "Secret123").await.unwrap();
    assert!(outcome.user.email_verified);
}

#[tokio::test]
async fn test_emailed_verification_code_verifies() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("esi", "CS20230011"))
        .await
        .unwrap();
    let message = f.notifier.last().expect("verification email");
    assert_eq!(message.to.redacted(), "esi***");
    let code = f.notifier.last_code().unwrap();

    f.auth.verify_email(&response.user_id, &code).await.unwrap();
    let user = f.auth.get_user(&response.user_id).await.unwrap();
    assert!(user.email_verified);
    assert!(user.verified_at.is_some());
}

#[tokio::test]
async fn test_verification_code_expires() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("kwame", "CS20230012"))
        .await
        .unwrap();
    let code = f.notifier.last_code().unwrap();

    f.clock.advance(Duration::minutes(15));
    let err = f
        .auth
        .verify_email(&response.user_id, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));

    // a resent code works
    f.auth.resend_verification(&response.user_id).await.unwrap();
    let code = f.notifier.last_code().unwrap();
    f.auth.verify_email(&response.user_id, &code).await.unwrap();
}

#[tokio::test]
async fn test_reset_token_expires_after_one_hour() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("alice", "CS20230020"))
        .await
        .unwrap();
    let before = stored_hash(f.store.as_ref(), &response.user_id).await;

    f.auth
        .request_password_reset(ResetChannel::Email, "alice@ktu.edu.gh", "CS20230020")
        .await
        .unwrap();
    let token = f.notifier.last_reset_token().expect("reset link");
    assert_eq!(token.len(), 32);
    assert!(f.auth.check_reset_token(&token).await.unwrap());

    f.clock.advance(Duration::hours(1));
    assert!(!f.auth.check_reset_token(&token).await.unwrap());
    let err = f
        .auth
        .reset_password(&token, "NewSecret456")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
    assert_eq!(stored_hash(f.store.as_ref(), &response.user_id).await, before);
}

#[tokio::test]
async fn test_reset_password_replaces_hash_once() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("adjoa", "CS20230021"))
        .await
        .unwrap();
    f.auth
        .request_password_reset(ResetChannel::Phone, "+233 20 123 4567", "cs20230021")
        .await
        .unwrap();
    let message = f.notifier.last().unwrap();
    assert!(matches!(message.to, backend_lib::notify::Recipient::Phone(_)));
    let token = f.notifier.last_reset_token().unwrap();

    f.clock.advance(Duration::minutes(59));
    f.auth.reset_password(&token, "NewSecret456").await.unwrap();
    let after = stored_hash(f.store.as_ref(), &response.user_id).await;

    let err = f
        .auth
        .reset_password(&token, "Another789")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
    assert_eq!(stored_hash(f.store.as_ref(), &response.user_id).await, after);

    assert!(f
        .auth
        .verify_credentials("adjoa", "NewSecret456")
        .await
        .unwrap()
        .is_some());
    assert!(f
        .auth
        .verify_credentials("adjoa", "Secret123")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_phone_reset_targets_the_matching_student() {
    let f = fixture();
    // both forms carry the same phone number
    let first = f
        .auth
        .register_student(student_form("kwame", "CS20230030"))
        .await
        .unwrap();
    let second = f
        .auth
        .register_student(student_form("efua", "CS20230031"))
        .await
        .unwrap();
    let first_hash = stored_hash(f.store.as_ref(), &first.user_id).await;
    let second_hash = stored_hash(f.store.as_ref(), &second.user_id).await;
    let sent_before = f.notifier.sent().len();

    f.auth
        .request_password_reset(ResetChannel::Phone, "+233201234567", "CS20230031")
        .await
        .unwrap();
    assert_eq!(f.notifier.sent().len(), sent_before + 1);
    let token = f.notifier.last_reset_token().unwrap();
    f.auth.reset_password(&token, "NewSecret456").await.unwrap();

    assert_ne!(stored_hash(f.store.as_ref(), &second.user_id).await, second_hash);
    assert_eq!(stored_hash(f.store.as_ref(), &first.user_id).await, first_hash);
    assert!(f
        .auth
        .verify_credentials("efua", "NewSecret456")
        .await
        .unwrap()
        .is_some());

    // a student id that does not own the phone sends nothing
    f.auth
        .request_password_reset(ResetChannel::Phone, "+233209999999", "CS20230030")
        .await
        .unwrap();
    assert_eq!(f.notifier.sent().len(), sent_before + 1);
}

#[tokio::test]
async fn test_bad_reset_token_leaves_hash_unchanged() {
    let f = fixture();
    let response = f
        .auth
        .register_student(student_form("abena", "CS20230022"))
        .await
        .unwrap();
    let before = stored_hash(f.store.as_ref(), &response.user_id).await;

    for token in ["", "short", &"A".repeat(32)] {
        assert!(f.auth.reset_password(token, "NewSecret456").await.is_err());
    }
    // a weak password is refused before the token is touched
    f.auth
        .request_password_reset(ResetChannel::Email, "abena@ktu.edu.gh", "CS20230022")
        .await
        .unwrap();
    let token = f.notifier.last_reset_token().unwrap();
    let err = f.auth.reset_password(&token, "weak").await.unwrap_err();
    assert!(matches!(err, AppError::WeakPassword(_)));
    assert!(f.auth.check_reset_token(&token).await.unwrap());

    assert_eq!(stored_hash(f.store.as_ref(), &response.user_id).await, before);
}

#[tokio::test]
async fn test_reset_request_for_unknown_contact_is_silent() {
    let f = fixture();
    f.auth
        .register_student(student_form("efua", "CS20230023"))
        .await
        .unwrap();
    let sent = f.notifier.sent().len();

    // wrong student id for a known email
    f.auth
        .request_password_reset(ResetChannel::Email, "efua@ktu.edu.gh", "CS99999999")
        .await
        .unwrap();
    f.auth
        .request_password_reset(ResetChannel::Email, "nobody@ktu.edu.gh", "CS20230023")
        .await
        .unwrap();
    assert_eq!(f.notifier.sent().len(), sent);
}

#[tokio::test]
async fn test_reset_ends_existing_sessions() {
    let f = fixture();
    let user = f
        .auth
        .register(
            NewAccount::new("yaa", "Secret123", Role::Student)
                .with_email("yaa@ktu.edu.gh")
                .verified(),
        )
        .await
        .unwrap();
    let outcome = f.auth.login("yaa", "Secret123").await.unwrap();

    let token = f
        .auth
        .tokens()
        .issue(&user.id, TokenPurpose::PasswordReset)
        .await
        .unwrap();
    f.auth
        .reset_password(&token.value, "NewSecret456")
        .await
        .unwrap();
    assert!(!f.auth.logout(&outcome.token).await);
}

#[tokio::test]
async fn test_token_boundary_counts_as_expired() {
    let f = fixture();
    let token = f
        .auth
        .tokens()
        .issue("user-1", TokenPurpose::PasswordReset)
        .await
        .unwrap();

    f.clock.set(token.expires_at - Duration::seconds(1));
    assert_eq!(
        f.auth
            .tokens()
            .peek(&token.value, TokenPurpose::PasswordReset)
            .await
            .unwrap(),
        "user-1"
    );

    f.clock.set(token.expires_at);
    let err = f
        .auth
        .tokens()
        .validate_and_consume(&token.value, TokenPurpose::PasswordReset)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));
}

#[tokio::test]
async fn test_concurrent_consume_on_sqlite_succeeds_once() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(dir.path().join("portal.db")).unwrap());
    let clock = Arc::new(ManualClock::starting_now());
    let tokens = Arc::new(TokenService::new(store, clock, TokenSettings::default()));
    let token = tokens
        .issue("user-1", TokenPurpose::PasswordReset)
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let tokens = tokens.clone();
        let value = token.value.clone();
        tasks.spawn(async move {
            tokens
                .validate_and_consume(&value, TokenPurpose::PasswordReset)
                .await
        });
    }

    let mut winners = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(user_id) => {
                assert_eq!(user_id, "user-1");
                winners += 1;
            },
            Err(AppError::TokenAlreadyUsed) => {},
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_seed_admin_creates_then_resets() {
    let f = fixture();
    let admin = f
        .auth
        .seed_admin("root", "root@ktu.edu.gh", "Secret123")
        .await
        .unwrap();
    assert_eq!(admin.role, Role::Supaadmin);

    f.auth
        .seed_admin("root", "root@ktu.edu.gh", "Changed456")
        .await
        .unwrap();
    assert!(f
        .auth
        .verify_credentials("root", "Changed456")
        .await
        .unwrap()
        .is_some());

    f.auth
        .register(NewAccount::new("someone", "Secret123", Role::Student))
        .await
        .unwrap();
    let err = f
        .auth
        .seed_admin("someone", "someone@ktu.edu.gh", "Secret123")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateUsername));
}
