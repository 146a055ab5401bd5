//! Read-only ranking of idle polecats.

use std::cmp::Ordering;

use anyhow::Result;
use tracing::debug;

use crate::polecat::{Polecat, Preference};
use crate::registry::Registry;
use crate::workflow::CleanlinessCheck;

/// What to look for in a rig's idle pool.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub rig: &'a str,
    /// Exact, case-sensitive polecat name.
    pub name: Option<&'a str>,
    pub preference: Preference,
}

/// Return the idle polecats matching `request`, most preferred first.
///
/// An empty result with `request.name` set means the named polecat is not
/// idle in the rig; callers must not treat that as pool exhaustion.
pub fn locate(
    registry: &dyn Registry,
    checker: &dyn CleanlinessCheck,
    request: SelectionRequest<'_>,
) -> Result<Vec<Polecat>> {
    let mut candidates = registry.list_idle(request.rig)?;
    let idle = candidates.len();

    if let Some(name) = request.name {
        candidates.retain(|p| p.name == name);
    }

    rank(&mut candidates, request.preference, checker);

    debug!(
        rig = request.rig,
        name = ?request.name,
        preference = %request.preference,
        idle,
        candidates = candidates.len(),
        "locate:ranked"
    );
    Ok(candidates)
}

/// Order candidates in place. `Any` keeps registry order and skips the cleanliness check.
pub fn rank(candidates: &mut [Polecat], preference: Preference, checker: &dyn CleanlinessCheck) {
    match preference {
        Preference::Any => {}
        Preference::Newest => candidates.sort_by(newest_first),
        Preference::Oldest => candidates.sort_by(|a, b| {
            a.created_ts
                .cmp(&b.created_ts)
                .then_with(|| a.name.cmp(&b.name))
        }),
        Preference::Cleanest => {
            for polecat in candidates.iter_mut() {
                polecat.cleanliness = checker.check(polecat);
            }
            candidates.sort_by(|a, b| {
                a.cleanliness
                    .cmp(&b.cleanliness)
                    .then_with(|| newest_first(a, b))
            });
        }
    }
}

fn newest_first(a: &Polecat, b: &Polecat) -> Ordering {
    b.created_ts
        .cmp(&a.created_ts)
        .then_with(|| a.name.cmp(&b.name))
}
