// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const USER_REGISTERED: &str = "user.registered";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const PASSWORD_CHANGED: &str = "password.changed";
pub const PASSWORD_RESET: &str = "password.reset";
pub const TOKEN_ISSUED: &str = "token.issued";
pub const TOKEN_CONSUMED: &str = "token.consumed";
pub const TOKEN_REJECTED: &str = "token.rejected";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const ISSUE_SUBMITTED: &str = "issue.submitted";
pub const ISSUE_STATUS_CHANGED: &str = "issue.status_changed";
pub const NOTIFICATION_FAILED: &str = "notification.failed";
pub const RATE_LIMITED: &str = "http.rate_limited";
