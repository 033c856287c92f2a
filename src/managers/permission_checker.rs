//! Server-side authorization rules.
//!
//! The store is reached with the published anon key, so these checks are
//! the only thing standing between a browser session and a mutation.

use tracing::warn;

use crate::config::BootstrapPolicy;
use crate::error::{AppError, Result};
use crate::models::User;

/// Anything a team member does: create events, answer, read the roster
pub fn require_approved(actor: &User) -> Result<()> {
    if actor.is_approved {
        Ok(())
    } else {
        warn!("Unapproved user {} attempted a member action", actor.id);
        Err(AppError::permission_denied("account is not approved"))
    }
}

/// Roster management, admin panel, refresh
pub fn require_admin(actor: &User) -> Result<()> {
    require_approved(actor)?;
    if actor.is_admin() {
        Ok(())
    } else {
        warn!("Member {} attempted an admin action", actor.id);
        Err(AppError::permission_denied("admin role required"))
    }
}

/// Admins may delete anyone but themselves
pub fn check_delete(actor: &User, target_id: &str) -> Result<()> {
    require_admin(actor)?;
    if actor.id == target_id {
        return Err(AppError::validation("自分自身を削除することはできません。"));
    }
    Ok(())
}

/// Editing one's own name/email is open to every approved member; anything
/// else about another user needs an admin
pub fn check_edit(actor: &User, target_id: &str) -> Result<()> {
    if actor.id == target_id {
        require_approved(actor)
    } else {
        require_admin(actor)
    }
}

/// Whether `actor` may promote themself to an approved admin
pub fn can_bootstrap(policy: BootstrapPolicy, users: &[User]) -> bool {
    policy == BootstrapPolicy::FirstAdmin && !users.iter().any(User::is_admin)
}
