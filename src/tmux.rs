use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::debug;

use crate::cmd::Cmd;

/// Helper function to add prefix to a session name
pub fn prefixed(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

/// Session name for a polecat: `<prefix><rig>-<name>`.
pub fn session_name(prefix: &str, rig: &str, polecat: &str) -> String {
    prefixed(prefix, &format!("{}-{}", rig, polecat))
}

/// Check if a tmux session with the given name exists
pub fn session_exists(session: &str) -> Result<bool> {
    let target = format!("={}", session);
    Cmd::new("tmux")
        .args(&["has-session", "-t", &target])
        .run_as_check()
}

/// Create a detached session rooted at `working_dir`.
pub fn create_session(session: &str, working_dir: &Path) -> Result<()> {
    let working_dir_str = working_dir
        .to_str()
        .ok_or_else(|| anyhow!("Working directory path contains non-UTF8 characters"))?;

    if session_exists(session)? {
        return Err(anyhow!("A tmux session named '{}' already exists", session));
    }

    Cmd::new("tmux")
        .args(&["new-session", "-d", "-s", session, "-c", working_dir_str])
        .run()
        .context("Failed to create tmux session")?;
    debug!(session, dir = %working_dir.display(), "tmux:session created");
    Ok(())
}

/// Send a command line (followed by Enter) to the session's active pane
pub fn send_keys(session: &str, command: &str) -> Result<()> {
    let target = format!("={}:", session);
    Cmd::new("tmux")
        .args(&["send-keys", "-t", &target, "-l", command])
        .run()
        .context("Failed to send keys to tmux session")?;
    Cmd::new("tmux")
        .args(&["send-keys", "-t", &target, "Enter"])
        .run()
        .context("Failed to send Enter to tmux session")?;
    Ok(())
}

/// Kill a session if it exists.
pub fn kill_session(session: &str) -> Result<()> {
    if !session_exists(session)? {
        return Ok(());
    }
    let target = format!("={}", session);
    Cmd::new("tmux")
        .args(&["kill-session", "-t", &target])
        .run()
        .context("Failed to kill tmux session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_joins_rig_and_polecat() {
        assert_eq!(session_name("pc-", "gastown", "nux"), "pc-gastown-nux");
        assert_eq!(session_name("", "beads", "toast"), "beads-toast");
    }
}
