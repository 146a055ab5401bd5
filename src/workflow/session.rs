use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::SessionManager;
use crate::polecat::Polecat;
use crate::tmux;

/// tmux-backed sessions named `<prefix><rig>-<name>`.
pub struct TmuxSessions {
    prefix: String,
    agent: Option<String>,
}

impl TmuxSessions {
    pub fn new(prefix: impl Into<String>, agent: Option<String>) -> Self {
        Self {
            prefix: prefix.into(),
            agent,
        }
    }

    pub fn session_for(&self, polecat: &Polecat) -> String {
        tmux::session_name(&self.prefix, &polecat.rig, &polecat.name)
    }
}

impl SessionManager for TmuxSessions {
    fn start_session(&self, polecat: &Polecat) -> Result<()> {
        which::which("tmux").context("tmux is not installed or not on PATH")?;

        let session = self.session_for(polecat);
        tmux::create_session(&session, &polecat.clone_path)?;

        if let Some(agent) = self.agent.as_deref().filter(|a| !a.trim().is_empty())
            && let Err(e) = tmux::send_keys(&session, agent)
        {
            // Leave nothing half-started behind; the caller rolls the claim back.
            if let Err(kill_err) = tmux::kill_session(&session) {
                warn!(session = %session, error = %kill_err, "session:cleanup failed");
            }
            return Err(e.context(format!("Failed to start agent in session '{}'", session)));
        }

        info!(session = %session, path = %polecat.clone_path.display(), "session:started");
        Ok(())
    }

    fn stop_session(&self, polecat: &Polecat) -> Result<()> {
        let session = self.session_for(polecat);
        if which::which("tmux").is_err() {
            debug!(session = %session, "session:tmux missing, nothing to stop");
            return Ok(());
        }
        tmux::kill_session(&session)?;
        info!(session = %session, "session:stopped");
        Ok(())
    }
}
