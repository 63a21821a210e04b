// ==============================
// tests/unit/rate_limit_tests.rs
// ==============================
//! Failed-login lockout and per-client request limiting
use std::time::Duration;

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, HeaderValue};
use backend_lib::auth::AuthRateLimiter;
use backend_lib::middleware::rate_limit::{client_key, RateLimiter};

#[test]
fn test_rate_limiter_allows_initial_attempts() {
    let rate_limiter = AuthRateLimiter::default();
    assert!(rate_limiter.check_rate_limit("127.0.0.1"));
}

#[test]
fn test_rate_limiter_blocks_after_max_attempts() {
    let rate_limiter = AuthRateLimiter::default();

    // default max is 5
    for _ in 0..5 {
        rate_limiter.record_failed_attempt("127.0.0.2");
    }

    assert!(!rate_limiter.check_rate_limit("127.0.0.2"));
    assert!(rate_limiter.check_rate_limit("127.0.0.3"));
}

#[test]
fn test_rate_limiter_resets_after_success() {
    let rate_limiter = AuthRateLimiter::default();

    for _ in 0..4 {
        rate_limiter.record_failed_attempt("127.0.0.4");
    }
    rate_limiter.record_success("127.0.0.4");

    // a fresh count after the success
    for _ in 0..4 {
        rate_limiter.record_failed_attempt("127.0.0.4");
    }
    assert!(rate_limiter.check_rate_limit("127.0.0.4"));
}

#[test]
fn test_lockout_expires() {
    let rate_limiter = AuthRateLimiter::new(2, Duration::from_millis(20));
    rate_limiter.record_failed_attempt("10.1.1.1");
    rate_limiter.record_failed_attempt("10.1.1.1");
    assert!(!rate_limiter.check_rate_limit("10.1.1.1"));

    std::thread::sleep(Duration::from_millis(40));
    assert!(rate_limiter.check_rate_limit("10.1.1.1"));
    rate_limiter.cleanup();
    assert!(rate_limiter.check_rate_limit("10.1.1.1"));
}

#[test]
fn test_request_limiter_budget() {
    let limiter = RateLimiter::new(Duration::from_secs(60), 3);
    for _ in 0..3 {
        assert!(limiter.check("client"));
    }
    assert!(!limiter.check("client"));
    assert!(limiter.check("other"));
}

#[test]
fn test_client_key_from_forwarded_for() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static(" 192.0.2.7 ,10.0.0.1"));
    assert_eq!(client_key(&headers, &Extensions::new(), true), "192.0.2.7");
}

#[test]
fn test_client_key_ignores_forwarded_for_by_default() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("192.0.2.7"));
    let mut extensions = Extensions::new();
    extensions.insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 4], 51000))));
    assert_eq!(client_key(&headers, &extensions, false), "203.0.113.4");
}
