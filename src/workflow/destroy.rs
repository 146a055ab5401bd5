use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use super::SessionManager;
use super::context::ResolvedRig;
use crate::git;
use crate::polecat::{Polecat, PolecatState};
use crate::registry::{Registry, Transition};
use crate::sling::SlingError;

/// Attempts at the "any state -> Destroyed" compare-and-set before giving up.
const MAX_DESTROY_ATTEMPTS: usize = 5;

/// Tear a polecat down.
///
/// The record is marked Destroyed first so no dispatch can claim it while the
/// session, worktree, and branch are removed. `rig` is `None` when the rig's
/// repository cannot be resolved; the worktree is then left on disk.
pub fn destroy(
    registry: &dyn Registry,
    sessions: &dyn SessionManager,
    rig: Option<&ResolvedRig>,
    rig_name: &str,
    name: &str,
    keep_worktree: bool,
) -> Result<Polecat> {
    let destroyed = mark_destroyed(registry, rig_name, name)?;

    if let Err(e) = sessions.stop_session(&destroyed) {
        warn!(rig = rig_name, name, error = %e, "destroy:failed to stop session");
    }

    if !keep_worktree {
        match rig {
            Some(rig) => {
                debug!(
                    rig = %rig.name,
                    path = %destroyed.clone_path.display(),
                    "destroy:removing worktree"
                );
                git::remove_worktree_in(&rig.repo, &destroyed.clone_path, true)?;
                if let Some(branch) = destroyed.branch.as_deref() {
                    git::delete_branch_in(&rig.repo, branch, true)?;
                }
            }
            None => warn!(
                rig = rig_name,
                name,
                path = %destroyed.clone_path.display(),
                "destroy:rig repository unknown, leaving worktree on disk"
            ),
        }
    }

    info!(rig = rig_name, name, keep_worktree, "destroy:done");
    Ok(destroyed)
}

fn mark_destroyed(registry: &dyn Registry, rig: &str, name: &str) -> Result<Polecat> {
    for _ in 0..MAX_DESTROY_ATTEMPTS {
        let current = registry
            .get(rig, name)?
            .ok_or_else(|| SlingError::PolecatNotFound {
                rig: rig.to_string(),
                name: name.to_string(),
            })?;
        match registry.transition(rig, name, current.state, PolecatState::Destroyed)? {
            Transition::Applied(polecat) => return Ok(polecat),
            Transition::Conflict { .. } => continue,
        }
    }
    Err(anyhow!(
        "Polecat '{}' kept changing state; could not mark it destroyed",
        name
    ))
}
