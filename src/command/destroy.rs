use anyhow::Result;
use tracing::debug;

use crate::config::Config;
use crate::{spinner, workflow};

pub fn run(rig: &str, name: &str, keep_worktree: bool) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(&config)?;
    let sessions = super::sessions(&config);

    let resolved = match workflow::resolve_rig(&config, rig) {
        Ok(resolved) => Some(resolved),
        Err(e) => {
            debug!(rig, error = %e, "destroy:rig not resolvable");
            None
        }
    };

    let polecat = spinner::with_spinner(&format!("Destroying polecat '{}'", name), || {
        workflow::destroy(
            store.as_ref(),
            sessions.as_ref(),
            resolved.as_ref(),
            rig,
            name,
            keep_worktree,
        )
    })?;

    if keep_worktree || resolved.is_none() {
        println!("  Worktree kept at {}", polecat.clone_path.display());
    }
    Ok(())
}
