use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cmd::Cmd;
use crate::polecat::Cleanliness;

/// Get the root directory of the git repository containing the given path.
pub fn get_repo_root_for(dir: &Path) -> Result<PathBuf> {
    let path = Cmd::new("git")
        .workdir(dir)
        .args(&["rev-parse", "--show-toplevel"])
        .run_and_capture_stdout()
        .with_context(|| format!("Not a git repository: {}", dir.display()))?;
    Ok(PathBuf::from(path))
}

/// Check if the repository has any commits (HEAD is valid)
pub fn has_commits_in(repo: &Path) -> Result<bool> {
    Cmd::new("git")
        .workdir(repo)
        .args(&["rev-parse", "--verify", "--quiet", "HEAD"])
        .run_as_check()
}

/// Get the default branch for a repository at a specific path
pub fn get_default_branch_in(repo: &Path) -> Result<String> {
    if let Ok(ref_name) = Cmd::new("git")
        .workdir(repo)
        .args(&["symbolic-ref", "refs/remotes/origin/HEAD"])
        .run_and_capture_stdout()
        && let Some(branch) = ref_name.strip_prefix("refs/remotes/origin/")
    {
        debug!(branch = branch, "git:default branch from remote HEAD");
        return Ok(branch.to_string());
    }

    for candidate in ["main", "master"] {
        if branch_exists_in(candidate, repo)? {
            debug!(branch = candidate, "git:default branch (local fallback)");
            return Ok(candidate.to_string());
        }
    }

    if !has_commits_in(repo)? {
        return Err(anyhow!(
            "The repository at {} has no commits yet. Make an initial commit before creating polecats.",
            repo.display()
        ));
    }

    Err(anyhow!(
        "Could not determine the default branch of {}. Set 'base_branch' for the rig in the config.",
        repo.display()
    ))
}

/// Check if a branch (or any revision) exists in a repository
pub fn branch_exists_in(branch_name: &str, repo: &Path) -> Result<bool> {
    Cmd::new("git")
        .workdir(repo)
        .args(&["rev-parse", "--verify", "--quiet", branch_name])
        .run_as_check()
}

/// Create a new worktree at `worktree_path` on a new branch cut from `base`.
pub fn create_worktree_in(
    repo: &Path,
    worktree_path: &Path,
    branch_name: &str,
    base: &str,
) -> Result<()> {
    let path_str = worktree_path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid worktree path"))?;

    Cmd::new("git")
        .workdir(repo)
        .args(&["worktree", "add", "-b", branch_name, path_str, base])
        .run()
        .context("Failed to create worktree")?;
    Ok(())
}

/// Remove a worktree directory and its administrative files.
pub fn remove_worktree_in(repo: &Path, worktree_path: &Path, force: bool) -> Result<()> {
    let path_str = worktree_path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid worktree path"))?;

    let mut cmd = Cmd::new("git").workdir(repo).args(&["worktree", "remove"]);
    if force {
        cmd = cmd.arg("--force");
    }
    cmd.arg(path_str)
        .run()
        .context("Failed to remove worktree")?;
    Ok(())
}

/// Delete a local branch.
pub fn delete_branch_in(repo: &Path, branch_name: &str, force: bool) -> Result<()> {
    let flag = if force { "-D" } else { "-d" };
    Cmd::new("git")
        .workdir(repo)
        .args(&["branch", flag, branch_name])
        .run()
        .context("Failed to delete branch")?;
    Ok(())
}

/// Classify the working copy at `worktree_path`.
///
/// Any failure to run `git status` yields `Unknown`.
pub fn cleanliness(worktree_path: &Path) -> Cleanliness {
    if !worktree_path.is_dir() {
        return Cleanliness::Unknown;
    }
    match Cmd::new("git")
        .workdir(worktree_path)
        .args(&["status", "--porcelain=v2"])
        .run_and_capture_stdout()
    {
        Ok(output) => classify_status(&output),
        Err(e) => {
            debug!(path = %worktree_path.display(), error = %e, "git:status failed");
            Cleanliness::Unknown
        }
    }
}

/// Porcelain v2 entries: `1`/`2` changed, `u` unmerged, `?` untracked.
/// Header (`#`) and ignored (`!`) lines do not make a copy dirty.
fn classify_status(output: &str) -> Cleanliness {
    let dirty = output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|kind| matches!(kind, "1" | "2" | "u" | "?"));
    if dirty {
        Cleanliness::Dirty
    } else {
        Cleanliness::Clean
    }
}
