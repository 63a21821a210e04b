// ==========================
// tests/unit/config_tests.rs
// ==========================
//! Configuration loading
use backend_lib::config::{LogFormat, Settings, StoreSettings};
use tempfile::tempdir;

#[test]
fn test_sqlite_store_from_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
        log_format = "json"
        categories = ["academic", "hostel"]

        [store]
        backend = "sqlite"
        path = "/var/lib/portal/portal.db"

        [tokens]
        reset_ttl_secs = 1800
        "#,
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.log_format, LogFormat::Json);
    assert_eq!(settings.categories, vec!["academic", "hostel"]);
    assert_eq!(
        settings.store,
        StoreSettings::Sqlite {
            path: "/var/lib/portal/portal.db".into()
        }
    );
    assert_eq!(settings.tokens.reset_ttl_secs, 1800);
    assert_eq!(settings.tokens.verification_ttl_secs, 900);
}

#[test]
fn test_firebase_store_defaults_timeout() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
        [store]
        backend = "firebase"
        url = "https://portal-default-rtdb.firebaseio.com"
        "#,
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    match settings.store {
        StoreSettings::Firebase {
            url,
            auth,
            timeout_secs,
        } => {
            assert_eq!(url, "https://portal-default-rtdb.firebaseio.com");
            assert!(auth.is_none());
            assert_eq!(timeout_secs, 10);
        },
        other => panic!("unexpected store: {other:?}"),
    }
}

#[test]
fn test_invalid_file_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "categories = []\n").unwrap();
    assert!(Settings::load_from(&config_path).is_err());
}
