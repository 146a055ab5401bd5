//! Filesystem-backed polecat registry.
//!
//! Records live under the state directory as one JSON file per polecat:
//! `<state_dir>/rigs/<rig>/<name>.json`, each guarded by a sibling
//! `<name>.lock` used for compare-and-set.

pub(crate) mod store;

use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::config::{self, Config};

pub use store::StateStore;

/// Resolve the state directory.
///
/// Priority: `state_dir` from config > `$XDG_STATE_HOME/polecats` >
/// `~/.local/state/polecats`.
pub fn state_dir(config: &Config) -> Result<PathBuf> {
    if let Some(ref dir) = config.state_dir {
        return Ok(config::expand_home(dir));
    }

    if let Ok(state_home) = std::env::var("XDG_STATE_HOME")
        && !state_home.is_empty()
    {
        return Ok(PathBuf::from(state_home).join("polecats"));
    }

    home::home_dir()
        .map(|home| home.join(".local").join("state").join("polecats"))
        .ok_or_else(|| anyhow!("Could not determine home directory for state storage"))
}

/// Reject rig or polecat names that would escape the state directory.
pub fn validate_component(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(anyhow!(
            "Invalid {} name '{}': use letters, digits, '-', '_' or '.'",
            kind,
            value
        ));
    }
    Ok(())
}
