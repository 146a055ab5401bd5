use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Result, anyhow};

use super::{Registry, RegistryError, Transition};
use crate::polecat::{Polecat, PolecatState, now_ts};

type Record = Arc<Mutex<Polecat>>;

/// In-process registry with one lock per record.
///
/// The rig map is only write-locked to insert; claims take the map read lock
/// and then the single record's mutex, so contention stays per-record.
#[derive(Default)]
pub struct MemoryRegistry {
    rigs: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, rig: &str, name: &str) -> Result<Option<Record>> {
        let rigs = self.rigs.read().map_err(|_| anyhow!("registry lock poisoned"))?;
        let Some(records) = rigs.get(rig) else {
            return Ok(None);
        };
        for record in records {
            let polecat = record.lock().map_err(|_| anyhow!("record lock poisoned"))?;
            if polecat.name == name && polecat.state != PolecatState::Destroyed {
                return Ok(Some(Arc::clone(record)));
            }
        }
        Ok(None)
    }
}

impl Registry for MemoryRegistry {
    fn list(&self, rig: &str) -> Result<Vec<Polecat>> {
        let rigs = self.rigs.read().map_err(|_| anyhow!("registry lock poisoned"))?;
        let mut out = Vec::new();
        for record in rigs.get(rig).into_iter().flatten() {
            let polecat = record.lock().map_err(|_| anyhow!("record lock poisoned"))?;
            if polecat.state != PolecatState::Destroyed {
                out.push(polecat.clone());
            }
        }
        Ok(out)
    }

    fn rigs(&self) -> Result<Vec<String>> {
        let rigs = self.rigs.read().map_err(|_| anyhow!("registry lock poisoned"))?;
        Ok(rigs.keys().cloned().collect())
    }

    fn get(&self, rig: &str, name: &str) -> Result<Option<Polecat>> {
        match self.find(rig, name)? {
            Some(record) => {
                let polecat = record.lock().map_err(|_| anyhow!("record lock poisoned"))?;
                Ok(Some(polecat.clone()))
            }
            None => Ok(None),
        }
    }

    fn insert(&self, polecat: Polecat) -> Result<()> {
        let mut rigs = self.rigs.write().map_err(|_| anyhow!("registry lock poisoned"))?;
        let records = rigs.entry(polecat.rig.clone()).or_default();
        for record in records.iter() {
            let existing = record.lock().map_err(|_| anyhow!("record lock poisoned"))?;
            if existing.name == polecat.name && existing.state != PolecatState::Destroyed {
                return Err(RegistryError::AlreadyExists {
                    rig: polecat.rig.clone(),
                    name: polecat.name.clone(),
                }
                .into());
            }
        }
        records.push(Arc::new(Mutex::new(polecat)));
        Ok(())
    }

    fn transition(
        &self,
        rig: &str,
        name: &str,
        expected: PolecatState,
        next: PolecatState,
    ) -> Result<Transition> {
        let Some(record) = self.find(rig, name)? else {
            return Ok(Transition::Conflict { actual: None });
        };
        let mut polecat = record.lock().map_err(|_| anyhow!("record lock poisoned"))?;
        if polecat.state != expected {
            return Ok(Transition::Conflict {
                actual: Some(polecat.state),
            });
        }
        polecat.state = next;
        polecat.updated_ts = now_ts();
        Ok(Transition::Applied(polecat.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Barrier;
    use std::thread;

    fn idle(rig: &str, name: &str, created_ts: u64) -> Polecat {
        Polecat::new(rig, name, PathBuf::from(format!("/pool/{name}")), created_ts)
    }

    #[test]
    fn list_idle_preserves_insertion_order() {
        let registry = MemoryRegistry::new();
        registry.insert(idle("gastown", "toast", 3)).unwrap();
        registry.insert(idle("gastown", "ace", 1)).unwrap();
        registry
            .insert(idle("gastown", "nux", 2).with_state(PolecatState::Active))
            .unwrap();
        registry.insert(idle("beads", "furiosa", 1)).unwrap();

        let names: Vec<_> = registry
            .list_idle("gastown")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["toast", "ace"]);
    }

    #[test]
    fn insert_rejects_live_duplicate_but_allows_reuse_of_destroyed_name() {
        let registry = MemoryRegistry::new();
        registry.insert(idle("gastown", "nux", 1)).unwrap();
        let err = registry.insert(idle("gastown", "nux", 2)).unwrap_err();
        assert!(err.downcast_ref::<RegistryError>().is_some());

        registry
            .transition("gastown", "nux", PolecatState::Idle, PolecatState::Destroyed)
            .unwrap();
        registry.insert(idle("gastown", "nux", 3)).unwrap();
        assert_eq!(registry.get("gastown", "nux").unwrap().unwrap().created_ts, 3);
    }

    #[test]
    fn try_claim_is_single_winner() {
        let registry = MemoryRegistry::new();
        registry.insert(idle("gastown", "nux", 1)).unwrap();

        let first = registry.try_claim("gastown", "nux").unwrap();
        assert!(matches!(first, Transition::Applied(ref p) if p.state == PolecatState::Claimed));

        let second = registry.try_claim("gastown", "nux").unwrap();
        assert_eq!(
            second,
            Transition::Conflict {
                actual: Some(PolecatState::Claimed)
            }
        );
        assert!(registry.list_idle("gastown").unwrap().is_empty());
    }

    #[test]
    fn transition_on_missing_record_conflicts() {
        let registry = MemoryRegistry::new();
        let result = registry.try_claim("gastown", "ghost").unwrap();
        assert_eq!(result, Transition::Conflict { actual: None });
    }

    #[test]
    fn concurrent_claims_never_double_claim() {
        const POOL: usize = 4;
        const CLAIMERS: usize = 16;

        let registry = Arc::new(MemoryRegistry::new());
        for i in 0..POOL {
            registry.insert(idle("gastown", &format!("p{i}"), i as u64)).unwrap();
        }

        let barrier = Arc::new(Barrier::new(CLAIMERS));
        let handles: Vec<_> = (0..CLAIMERS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut won = Vec::new();
                    for i in 0..POOL {
                        let name = format!("p{i}");
                        if let Some(p) = registry.try_claim("gastown", &name).unwrap().applied() {
                            won.push(p.name);
                            break;
                        }
                    }
                    won
                })
            })
            .collect();

        let mut winners: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(winners.len(), POOL);
        winners.sort();
        winners.dedup();
        assert_eq!(winners.len(), POOL);
    }
}
