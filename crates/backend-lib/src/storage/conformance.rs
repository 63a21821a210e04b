//! Behaviour every `Store` adapter must share. Each adapter's test module
//! calls [`run_all`] against a fresh instance.
use chrono::{Duration, Utc};
use concern_common::{IssueStatus, Role};

use super::{PasswordChange, Store};
use crate::error::AppError;
use crate::models::{
    IssueFilter, IssueRecord, Profile, ProfileUpdate, TokenPurpose, TokenRecord, UserLookup,
    UserRecord,
};

pub(crate) fn user(id: &str, username: &str, email: &str, student_id: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        username: username.to_string(),
        password_hash: "$scrypt$placeholder".to_string(),
        role: Role::Student,
        email: email.to_string(),
        email_verified: false,
        profile: Profile {
            first_name: "Kofi".to_string(),
            last_name: "Mensah".to_string(),
            phone: format!("+23320{id}"),
            student_id: student_id.to_string(),
            ..Profile::default()
        },
        created_at: Utc::now(),
        updated_at: None,
        password_reset_at: None,
        verified_at: None,
    }
}

pub(crate) fn token(id: &str, user_id: &str, value: &str, purpose: TokenPurpose) -> TokenRecord {
    let now = Utc::now();
    TokenRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        value: value.to_string(),
        purpose,
        created_at: now,
        expires_at: now + Duration::minutes(15),
        used: false,
        used_at: None,
    }
}

pub(crate) fn issue(id: &str, student_id: &str, minutes_ago: i64) -> IssueRecord {
    IssueRecord {
        id: id.to_string(),
        student_id: student_id.to_string(),
        subject: format!("Subject {id}"),
        category: "academic".to_string(),
        message: "Lecture timetable clash".to_string(),
        status: IssueStatus::Pending,
        response: String::new(),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        updated_at: None,
    }
}

pub(crate) async fn run_all(store: &dyn Store) {
    users_round_trip(store).await;
    duplicate_users_rejected(store).await;
    targeted_user_updates(store).await;
    tokens_consumed_once(store).await;
    issues_listed_newest_first(store).await;
}

async fn users_round_trip(store: &dyn Store) {
    let alice = user("u-alice", "alice", "alice@ktu.edu.gh", "CS1001");
    store.insert_user(&alice).await.unwrap();

    let by_id = store.find_user(UserLookup::Id("u-alice")).await.unwrap();
    assert_eq!(by_id.as_ref().map(|u| u.username.as_str()), Some("alice"));

    let by_name = store.find_user(UserLookup::Username("ALICE")).await.unwrap();
    assert_eq!(by_name.map(|u| u.id), Some("u-alice".to_string()));

    let by_email = store
        .find_user(UserLookup::Email("Alice@KTU.edu.gh"))
        .await
        .unwrap();
    assert!(by_email.is_some());

    let by_sid = store.find_user(UserLookup::StudentId("cs1001")).await.unwrap();
    assert!(by_sid.is_some());

    let by_phone = store.find_user(UserLookup::Phone("+23320u-alice")).await.unwrap();
    assert!(by_phone.is_some());

    assert!(store
        .find_user(UserLookup::Username("nobody"))
        .await
        .unwrap()
        .is_none());
}

async fn duplicate_users_rejected(store: &dyn Store) {
    let same_name = user("u-2", "Alice", "other@ktu.edu.gh", "CS2002");
    assert!(matches!(
        store.insert_user(&same_name).await,
        Err(AppError::DuplicateUsername)
    ));

    let same_sid = user("u-3", "bob", "bob@ktu.edu.gh", "CS1001");
    assert!(matches!(
        store.insert_user(&same_sid).await,
        Err(AppError::DuplicateStudentId)
    ));

    let same_email = user("u-4", "carol", "alice@ktu.edu.gh", "CS4004");
    assert!(matches!(
        store.insert_user(&same_email).await,
        Err(AppError::DuplicateEmail)
    ));
}

async fn targeted_user_updates(store: &dyn Store) {
    let at = Utc::now();
    assert!(store
        .update_password_hash("u-alice", "$scrypt$new", PasswordChange::Reset, at)
        .await
        .unwrap());
    assert!(store.mark_email_verified("u-alice", at).await.unwrap());
    let update = ProfileUpdate {
        level: Some("300".to_string()),
        ..ProfileUpdate::default()
    };
    assert!(store.update_profile("u-alice", &update, at).await.unwrap());

    let alice = store
        .find_user(UserLookup::Id("u-alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.password_hash, "$scrypt$new");
    assert!(alice.email_verified);
    assert!(alice.password_reset_at.is_some());
    assert_eq!(alice.profile.level, "300");
    assert_eq!(alice.profile.first_name, "Kofi");

    assert!(!store
        .update_password_hash("missing", "x", PasswordChange::Changed, at)
        .await
        .unwrap());
    assert!(!store.mark_email_verified("missing", at).await.unwrap());

    let users = store.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
}

async fn tokens_consumed_once(store: &dyn Store) {
    let code = token("t-1", "u-alice", "482913", TokenPurpose::EmailVerification);
    store.insert_token(&code).await.unwrap();

    let found = store
        .find_tokens("482913", TokenPurpose::EmailVerification)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(store
        .find_tokens("482913", TokenPurpose::PasswordReset)
        .await
        .unwrap()
        .is_empty());

    let at = Utc::now();
    assert!(store.consume_token("t-1", at).await.unwrap());
    assert!(!store.consume_token("t-1", at).await.unwrap());
    assert!(!store.consume_token("missing", at).await.unwrap());

    let found = store
        .find_tokens("482913", TokenPurpose::EmailVerification)
        .await
        .unwrap();
    assert!(found[0].used);
    assert!(found[0].used_at.is_some());
}

async fn issues_listed_newest_first(store: &dyn Store) {
    store.insert_issue(&issue("i-old", "u-alice", 30)).await.unwrap();
    store.insert_issue(&issue("i-new", "u-alice", 1)).await.unwrap();
    store.insert_issue(&issue("i-other", "u-bob", 10)).await.unwrap();

    let all = store.list_issues(&IssueFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["i-new", "i-other", "i-old"]);

    let at = Utc::now();
    assert!(store
        .update_issue_status("i-old", IssueStatus::Resolved, Some("Fixed"), at)
        .await
        .unwrap());
    assert!(store
        .update_issue_status("i-other", IssueStatus::Deleted, None, at)
        .await
        .unwrap());
    assert!(!store
        .update_issue_status("missing", IssueStatus::Resolved, None, at)
        .await
        .unwrap());

    let resolved = store.get_issue("i-old").await.unwrap().unwrap();
    assert_eq!(resolved.status, IssueStatus::Resolved);
    assert_eq!(resolved.response, "Fixed");

    let mine = store
        .list_issues(&IssueFilter {
            student_id: Some("u-alice".to_string()),
            ..IssueFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);

    let visible = store.list_issues(&IssueFilter::default()).await.unwrap();
    assert!(visible.iter().all(|i| i.id != "i-other"));

    let pending = store
        .list_issues(&IssueFilter {
            status: Some(IssueStatus::Pending),
            ..IssueFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "i-new");
}
