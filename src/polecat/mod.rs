//! Core data model for polecats (ephemeral, named sandboxes).
//!
//! A polecat is a git worktree owned by a rig, optionally paired with a tmux
//! session. The registry owns the lifecycle state; everything else reads
//! snapshots.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a polecat.
///
/// `Idle -> Claimed -> Active`, `Claimed -> Idle` on a failed session start,
/// `Active -> Idle` on release. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolecatState {
    Idle,
    Claimed,
    Active,
    Destroyed,
}

impl PolecatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Claimed => "claimed",
            Self::Active => "active",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for PolecatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working-copy cleanliness. Ordering is "badness": `Clean < Dirty < Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cleanliness {
    Clean,
    Dirty,
    #[default]
    Unknown,
}

/// A single sandbox record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polecat {
    pub name: String,
    pub rig: String,
    pub clone_path: PathBuf,
    #[serde(default)]
    pub branch: Option<String>,
    pub created_ts: u64,
    pub state: PolecatState,
    #[serde(default)]
    pub updated_ts: u64,
    /// Recomputed on demand by a cleanliness check; never persisted.
    #[serde(skip)]
    pub cleanliness: Cleanliness,
}

impl Polecat {
    pub fn new(rig: &str, name: &str, clone_path: PathBuf, created_ts: u64) -> Self {
        Self {
            name: name.to_string(),
            rig: rig.to_string(),
            clone_path,
            branch: None,
            created_ts,
            state: PolecatState::Idle,
            updated_ts: created_ts,
            cleanliness: Cleanliness::Unknown,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_state(mut self, state: PolecatState) -> Self {
        self.state = state;
        self
    }
}

/// Ranking policy applied to idle candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Preference {
    /// First eligible in registry order, no ranking pass.
    #[default]
    Any,
    Newest,
    Oldest,
    Cleanest,
}

impl Preference {
    pub const VALUES: [&'static str; 4] = ["any", "newest", "oldest", "cleanest"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Cleanest => "cleanest",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preference '{0}' (expected one of: any, newest, oldest, cleanest)")]
pub struct UnknownPreference(pub String);

impl FromStr for Preference {
    type Err = UnknownPreference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "cleanest" => Ok(Self::Cleanest),
            _ => Err(UnknownPreference(s.to_string())),
        }
    }
}

/// Current time as UNIX seconds.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
