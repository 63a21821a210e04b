// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module: credentials, sessions, single-use tokens and role gates.

pub mod password;
pub mod rate_limit;
pub mod roles;
pub mod session;
pub mod token_generator;
pub mod tokens;
mod service;
mod service_impl;

pub use password::{validate_password_strength, ScryptHasher};
pub use rate_limit::AuthRateLimiter;
pub use roles::{authorize, require_role, HasRole};
pub use service::{AuthService, LoginOutcome, NewAccount};
pub use service_impl::DefaultAuth;
pub use session::{Session, SessionManager, SESSION_TTL};
pub use tokens::{TokenService, TokenState};
