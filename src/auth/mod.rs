//! Who may run a command: repository permission of the actor, and the
//! operator allowlist that can stand in for a pull request approval.

/// Collaborator/installation permission check for the invoking actor.
pub mod actor;
/// Operator allowlist by handle or org/team membership.
pub mod allowlist;
/// GitHub handle and team slug syntax.
pub mod username;

pub use actor::{ActorAuthorizer, Authorization};
pub use allowlist::{Allowlist, AllowlistEntry, AllowlistResolver};

/// Outcome of the actor permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionResult {
    Allowed,
    /// The actor was looked up and does not meet the threshold.
    Denied(String),
    /// A lookup needed to decide failed.
    Error(String),
}

impl PermissionResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionResult::Allowed)
    }

    /// User-facing explanation for anything other than `Allowed`.
    pub fn message(&self) -> Option<&str> {
        match self {
            PermissionResult::Allowed => None,
            PermissionResult::Denied(message) | PermissionResult::Error(message) => Some(message),
        }
    }
}
