//! Authorization policy for operations that expose another identity's data.
//!
//! Pure functions only: no I/O, no resource acquisition.

use crate::jwt::{Claims, Role};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No identity on the request
    Unauthenticated,
    /// Identity present but lacking privilege
    Forbidden,
}

pub type PolicyResult = std::result::Result<(), Denial>;

/// Self-or-admin access to the user identified by `target_id`.
///
/// Rules, in order: no claims is `Unauthenticated`; the admin role is always
/// permitted; a subject equal to `target_id` (exact string match) is
/// permitted; anything else is `Forbidden`.
pub fn authorize_self_or_admin(claims: Option<&Claims>, target_id: &str) -> PolicyResult {
    let claims = claims.ok_or(Denial::Unauthenticated)?;

    if claims.has_role(Role::Admin) {
        return Ok(());
    }

    if claims.subject() == target_id {
        return Ok(());
    }

    Err(Denial::Forbidden)
}
