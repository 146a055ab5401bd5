use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Provisioner;
use super::context::resolve_rig;
use crate::config::Config;
use crate::polecat::{Polecat, PolecatState, now_ts};
use crate::registry::{Registry, RegistryError, Transition};
use crate::{git, spinner};

/// Upper bound on numbered fallback names once the pool is used up.
const MAX_NUMBERED_NAMES: usize = 10_000;

/// Provisions polecats as git worktrees on a `polecat/<name>` branch.
pub struct GitProvisioner {
    config: Config,
    registry: Arc<dyn Registry>,
}

impl GitProvisioner {
    pub fn new(config: Config, registry: Arc<dyn Registry>) -> Self {
        Self { config, registry }
    }
}

pub fn branch_for(name: &str) -> String {
    format!("polecat/{}", name)
}

/// Pick the first pool name accepted by `is_free`, then `polecat-<n>`.
pub(crate) fn allocate_name(
    pool: &[String],
    mut is_free: impl FnMut(&str) -> Result<bool>,
) -> Result<String> {
    for name in pool {
        if is_free(name)? {
            return Ok(name.clone());
        }
    }
    for n in 1..=MAX_NUMBERED_NAMES {
        let name = format!("polecat-{}", n);
        if is_free(&name)? {
            return Ok(name);
        }
    }
    Err(anyhow!("No free polecat name available"))
}

impl Provisioner for GitProvisioner {
    fn check_rig(&self, rig: &str) -> Result<()> {
        resolve_rig(&self.config, rig).map(|_| ())
    }

    fn create_fresh(&self, rig: &str) -> Result<Polecat> {
        let resolved = resolve_rig(&self.config, rig)?;
        let base = match resolved.base_branch.clone() {
            Some(base) => base,
            None => git::get_default_branch_in(&resolved.repo)
                .context("Failed to determine the base branch for fresh polecats")?,
        };

        let name = allocate_name(&self.config.name_pool(), |candidate| {
            if resolved.polecat_dir.join(candidate).exists()
                || git::branch_exists_in(&branch_for(candidate), &resolved.repo)?
            {
                return Ok(false);
            }
            self.reserve(rig, candidate, &resolved.polecat_dir)
        })?;

        let clone_path = resolved.polecat_dir.join(&name);
        let branch = branch_for(&name);
        info!(
            rig,
            name = %name,
            path = %clone_path.display(),
            base = %base,
            "create:creating worktree"
        );

        let created = std::fs::create_dir_all(&resolved.polecat_dir)
            .with_context(|| {
                format!(
                    "Failed to create polecat directory {}",
                    resolved.polecat_dir.display()
                )
            })
            .and_then(|()| {
                spinner::with_spinner(&format!("Creating polecat {} in {}", name, rig), || {
                    git::create_worktree_in(&resolved.repo, &clone_path, &branch, &base)
                })
            });
        if let Err(e) = created {
            self.unreserve(rig, &name);
            return Err(e);
        }

        debug!(rig, name = %name, "create:done");
        self.registry
            .get(rig, &name)?
            .ok_or_else(|| anyhow!("Reservation for polecat '{}' disappeared", name))
    }
}

impl GitProvisioner {
    /// Register `name` as Claimed before any git work, so a concurrent
    /// creation moves on to another name. `Ok(false)` means it is taken.
    fn reserve(&self, rig: &str, name: &str, polecat_dir: &Path) -> Result<bool> {
        let reservation = Polecat::new(rig, name, polecat_dir.join(name), now_ts())
            .with_branch(branch_for(name))
            .with_state(PolecatState::Claimed);
        match self.registry.insert(reservation) {
            Ok(()) => Ok(true),
            Err(e)
                if matches!(
                    e.downcast_ref::<RegistryError>(),
                    Some(RegistryError::AlreadyExists { .. })
                ) =>
            {
                debug!(rig, name, "create:name taken");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn unreserve(&self, rig: &str, name: &str) {
        match self
            .registry
            .transition(rig, name, PolecatState::Claimed, PolecatState::Destroyed)
        {
            Ok(Transition::Applied(_)) => debug!(rig, name, "create:reservation released"),
            Ok(Transition::Conflict { actual }) => {
                warn!(rig, name, actual = ?actual, "create:reservation changed state")
            }
            Err(e) => warn!(rig, name, error = %e, "create:failed to release reservation"),
        }
    }
}
