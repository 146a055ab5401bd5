pub mod args;
pub mod destroy;
pub mod events;
pub mod list;
pub mod release;
pub mod sling;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::state::{self, StateStore};
use crate::workflow::TmuxSessions;

/// Open the registry under the configured state directory.
pub fn open_store(config: &Config) -> Result<Arc<StateStore>> {
    let dir = state::state_dir(config)?;
    let store = StateStore::new(&dir)
        .with_context(|| format!("Failed to open polecat registry at {}", dir.display()))?;
    Ok(Arc::new(store))
}

pub fn sessions(config: &Config) -> Arc<TmuxSessions> {
    Arc::new(TmuxSessions::new(
        config.session_prefix(),
        config.agent.clone(),
    ))
}
