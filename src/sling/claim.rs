//! Claim coordination: turn a ranked candidate list into at most one owner.

use anyhow::Result;
use tracing::debug;

use crate::polecat::Polecat;
use crate::registry::{Registry, Transition};

/// How the selected candidate is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMode {
    /// Compare-and-set each candidate in order until one succeeds.
    Live,
    /// Select without mutating; reports what `Live` would try first.
    DryRun,
}

impl ClaimMode {
    pub fn select(
        self,
        registry: &dyn Registry,
        candidates: &[Polecat],
    ) -> Result<Option<Polecat>> {
        match self {
            Self::Live => claim(registry, candidates),
            Self::DryRun => Ok(candidates.first().cloned()),
        }
    }
}

/// Walk `candidates` once, claiming the first one still idle.
///
/// A conflict means another dispatch won that candidate; move on to the next
/// one. Never retries a candidate and never re-ranks.
pub fn claim(registry: &dyn Registry, candidates: &[Polecat]) -> Result<Option<Polecat>> {
    for candidate in candidates {
        match registry.try_claim(&candidate.rig, &candidate.name)? {
            Transition::Applied(mut polecat) => {
                polecat.cleanliness = candidate.cleanliness;
                debug!(rig = %polecat.rig, name = %polecat.name, "claim:won");
                return Ok(Some(polecat));
            }
            Transition::Conflict { actual } => {
                debug!(
                    rig = %candidate.rig,
                    name = %candidate.name,
                    actual = ?actual,
                    "claim:conflict, trying next candidate"
                );
            }
        }
    }
    debug!(tried = candidates.len(), "claim:exhausted");
    Ok(None)
}
