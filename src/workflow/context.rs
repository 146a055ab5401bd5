use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{self, Config};
use crate::git;
use crate::sling::SlingError;

/// A rig's repository layout, resolved from config or the current repo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRig {
    pub name: String,
    pub repo: PathBuf,
    pub polecat_dir: PathBuf,
    /// Explicit base branch; `None` means the repo's default branch.
    pub base_branch: Option<String>,
}

/// Resolve a rig by name.
///
/// Configured rigs win. Otherwise, a rig named after the current repository's
/// directory resolves to that repository.
pub fn resolve_rig(config: &Config, rig: &str) -> Result<ResolvedRig> {
    let (repo, rig_config) = match config.rig(rig) {
        Some(rig_config) => {
            let repo = rig_config
                .repo
                .as_deref()
                .map(config::expand_home)
                .ok_or_else(|| anyhow!("Rig '{}' has no 'repo' configured", rig))?;
            (repo, rig_config.clone())
        }
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            let repo = git::get_repo_root_for(&cwd)
                .ok()
                .filter(|root| root.file_name().and_then(|n| n.to_str()) == Some(rig))
                .ok_or_else(|| SlingError::UnknownRig(rig.to_string()))?;
            (repo, Default::default())
        }
    };

    let polecat_dir = match rig_config.polecat_dir.as_deref() {
        Some(dir) => {
            let path = config::expand_home(dir);
            if path.is_absolute() {
                path
            } else {
                repo.join(path)
            }
        }
        // <repo>/../<repo name>__polecats
        None => {
            let project_name = repo
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Could not determine project name for {}", repo.display()))?;
            repo.parent()
                .ok_or_else(|| {
                    anyhow!("Could not determine parent directory of {}", repo.display())
                })?
                .join(format!("{}__polecats", project_name))
        }
    };

    debug!(
        rig,
        repo = %repo.display(),
        polecat_dir = %polecat_dir.display(),
        base = ?rig_config.base_branch,
        "rig:resolved"
    );

    Ok(ResolvedRig {
        name: rig.to_string(),
        repo,
        polecat_dir,
        base_branch: rig_config.base_branch,
    })
}
