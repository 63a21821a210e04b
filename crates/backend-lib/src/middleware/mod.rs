// crates/backend-lib/src/middleware/mod.rs

//! Request middleware and extractors.

pub mod rate_limit;
pub mod session;

pub use rate_limit::rate_limit;
pub use session::AuthUser;
