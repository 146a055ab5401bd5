//! Collaborators the dispatch engine drives: provisioning fresh polecats,
//! starting and stopping their sessions, and probing working-copy state.
//!
//! Each is a trait so the engine can be exercised without git or tmux.

mod context;
mod create;
mod destroy;
mod release;
mod session;

use anyhow::Result;

use crate::polecat::{Cleanliness, Polecat};

pub use context::{ResolvedRig, resolve_rig};
pub use create::GitProvisioner;
pub use destroy::destroy;
pub use release::release;
pub use session::TmuxSessions;

/// Creates fresh polecats. Errors are fatal to the dispatch.
pub trait Provisioner: Send + Sync {
    /// Fail with `SlingError::UnknownRig` when `rig` cannot be provisioned into.
    fn check_rig(&self, rig: &str) -> Result<()>;

    /// The returned polecat is already registered as Claimed by the caller.
    fn create_fresh(&self, rig: &str) -> Result<Polecat>;
}

/// Starts and stops interactive sessions for polecats.
pub trait SessionManager: Send + Sync {
    fn start_session(&self, polecat: &Polecat) -> Result<()>;

    fn stop_session(&self, polecat: &Polecat) -> Result<()>;
}

/// Computes a polecat's working-copy cleanliness on demand.
pub trait CleanlinessCheck: Send + Sync {
    fn check(&self, polecat: &Polecat) -> Cleanliness;
}

/// Checks with `git status` in the polecat's clone.
pub struct GitStatusCheck;

impl CleanlinessCheck for GitStatusCheck {
    fn check(&self, polecat: &Polecat) -> Cleanliness {
        crate::git::cleanliness(&polecat.clone_path)
    }
}
