//! Role gates.
//!
//! Roles are a flat set: no role implies another's permissions, so every
//! operation names the exact roles it admits.
use concern_common::Role;

use super::session::Session;
use crate::error::AppError;
use crate::models::UserRecord;

pub const STUDENT_ONLY: &[Role] = &[Role::Student];
pub const SUBADMIN_ONLY: &[Role] = &[Role::Subadmin];
pub const SUPAADMIN_ONLY: &[Role] = &[Role::Supaadmin];
pub const ADMINS: &[Role] = &[Role::Subadmin, Role::Supaadmin];
/// Issue deletion: the owner (checked separately) or triage staff
pub const ISSUE_MODERATORS: &[Role] = &[Role::Student, Role::Subadmin];

/// Anything carrying a role
pub trait HasRole {
    fn role(&self) -> Role;
}

impl HasRole for UserRecord {
    fn role(&self) -> Role {
        self.role
    }
}

impl HasRole for Session {
    fn role(&self) -> Role {
        self.role
    }
}

/// True iff a user is present and their role is one of `allowed`
pub fn authorize<U: HasRole + ?Sized>(user: Option<&U>, allowed: &[Role]) -> bool {
    user.is_some_and(|u| allowed.contains(&u.role()))
}

/// `Forbidden` unless `user` holds one of `allowed`
pub fn require_role<U: HasRole + ?Sized>(user: &U, allowed: &[Role]) -> Result<(), AppError> {
    if authorize(Some(user), allowed) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
