//! The sandbox registry: the single owner of polecat state.
//!
//! All mutations go through [`Registry::transition`], an atomic
//! compare-and-set on one record. Reads return snapshots.

#[cfg(test)]
mod memory;

use anyhow::Result;

use crate::polecat::{Polecat, PolecatState};

#[cfg(test)]
pub use memory::MemoryRegistry;

/// Result of a compare-and-set on a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The record was in the expected state and now holds the new one.
    Applied(Polecat),
    /// The record was not in the expected state (or no longer exists).
    Conflict { actual: Option<PolecatState> },
}

#[cfg(test)]
impl Transition {
    pub fn applied(self) -> Option<Polecat> {
        match self {
            Self::Applied(polecat) => Some(polecat),
            Self::Conflict { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("polecat '{name}' already exists in rig '{rig}'")]
    AlreadyExists { rig: String, name: String },
}

/// Authoritative store of polecat records.
///
/// Implementations must be Send + Sync so concurrent dispatches can share one.
pub trait Registry: Send + Sync {
    /// Snapshot of the idle polecats of a rig, in registry order.
    fn list_idle(&self, rig: &str) -> Result<Vec<Polecat>> {
        Ok(self
            .list(rig)?
            .into_iter()
            .filter(|p| p.state == PolecatState::Idle)
            .collect())
    }

    /// Snapshot of every non-destroyed polecat of a rig, in registry order.
    fn list(&self, rig: &str) -> Result<Vec<Polecat>>;

    /// Names of all rigs with at least one record.
    fn rigs(&self) -> Result<Vec<String>>;

    fn get(&self, rig: &str, name: &str) -> Result<Option<Polecat>>;

    /// Record a newly created polecat. Fails with [`RegistryError::AlreadyExists`]
    /// when a non-destroyed polecat with the same name exists in the rig.
    fn insert(&self, polecat: Polecat) -> Result<()>;

    /// Atomically move `rig/name` from `expected` to `next`.
    fn transition(
        &self,
        rig: &str,
        name: &str,
        expected: PolecatState,
        next: PolecatState,
    ) -> Result<Transition>;

    /// Atomically move `rig/name` from Idle to Claimed.
    fn try_claim(&self, rig: &str, name: &str) -> Result<Transition> {
        self.transition(rig, name, PolecatState::Idle, PolecatState::Claimed)
    }
}
