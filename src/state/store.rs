use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, trace, warn};

use super::validate_component;
use crate::polecat::{Polecat, PolecatState, now_ts};
use crate::registry::{Registry, RegistryError, Transition};

/// Registry persisted as JSON files, safe across processes.
///
/// Writers hold an exclusive `flock` on the record's lock file for the whole
/// read-compare-write. The record file itself is replaced via rename, so
/// readers never take locks and never observe a partial write.
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("rigs")).with_context(|| {
            format!("Failed to create state directory at {}", root.display())
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn rig_dir(&self, rig: &str) -> PathBuf {
        self.root.join("rigs").join(rig)
    }

    fn record_path(&self, rig: &str, name: &str) -> PathBuf {
        self.rig_dir(rig).join(format!("{name}.json"))
    }

    fn lock_path(&self, rig: &str, name: &str) -> PathBuf {
        self.rig_dir(rig).join(format!("{name}.lock"))
    }

    /// Take the exclusive per-record lock, creating the rig dir and lock file
    /// if needed. Released when the returned guard drops.
    fn lock_record(&self, rig: &str, name: &str) -> Result<Flock<File>> {
        validate_component("rig", rig)?;
        validate_component("polecat", name)?;
        fs::create_dir_all(self.rig_dir(rig))
            .with_context(|| format!("Failed to create rig directory for '{}'", rig))?;

        let path = self.lock_path(rig, name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        trace!(rig, name, "store:lock wait");
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| anyhow!("Failed to lock {}: {}", path.display(), errno))
    }

    fn read_record(path: &Path) -> Result<Option<Polecat>> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let polecat = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse polecat record {}", path.display()))?;
        Ok(Some(polecat))
    }

    fn write_record(&self, polecat: &Polecat) -> Result<()> {
        let dir = self.rig_dir(&polecat.rig);
        let path = self.record_path(&polecat.rig, &polecat.name);
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, polecat)?;
        tmp.flush()?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl Registry for StateStore {
    fn list(&self, rig: &str) -> Result<Vec<Polecat>> {
        validate_component("rig", rig)?;
        let dir = self.rig_dir(rig);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
            }
        };

        let mut polecats = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // A corrupt record must not hide the rest of the pool.
            match Self::read_record(&path) {
                Ok(Some(p)) if p.state != PolecatState::Destroyed => polecats.push(p),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "store:skipping record"),
            }
        }

        polecats.sort_by(|a, b| {
            a.created_ts
                .cmp(&b.created_ts)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(polecats)
    }

    fn rigs(&self) -> Result<Vec<String>> {
        let mut rigs: Vec<String> = fs::read_dir(self.root.join("rigs"))
            .context("Failed to read rigs directory")?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .collect();
        rigs.sort();
        Ok(rigs)
    }

    fn get(&self, rig: &str, name: &str) -> Result<Option<Polecat>> {
        validate_component("rig", rig)?;
        validate_component("polecat", name)?;
        Ok(Self::read_record(&self.record_path(rig, name))?
            .filter(|p| p.state != PolecatState::Destroyed))
    }

    fn insert(&self, polecat: Polecat) -> Result<()> {
        let _guard = self.lock_record(&polecat.rig, &polecat.name)?;
        let path = self.record_path(&polecat.rig, &polecat.name);
        if let Some(existing) = Self::read_record(&path)?
            && existing.state != PolecatState::Destroyed
        {
            return Err(RegistryError::AlreadyExists {
                rig: polecat.rig,
                name: polecat.name,
            }
            .into());
        }
        self.write_record(&polecat)?;
        debug!(rig = %polecat.rig, name = %polecat.name, state = %polecat.state, "store:inserted");
        Ok(())
    }

    fn transition(
        &self,
        rig: &str,
        name: &str,
        expected: PolecatState,
        next: PolecatState,
    ) -> Result<Transition> {
        let _guard = self.lock_record(rig, name)?;
        let Some(mut polecat) = Self::read_record(&self.record_path(rig, name))? else {
            return Ok(Transition::Conflict { actual: None });
        };
        if polecat.state != expected {
            trace!(rig, name, %expected, actual = %polecat.state, "store:cas conflict");
            return Ok(Transition::Conflict {
                actual: Some(polecat.state),
            });
        }
        polecat.state = next;
        polecat.updated_ts = now_ts();
        self.write_record(&polecat)?;
        debug!(rig, name, from = %expected, to = %next, "store:transition");
        Ok(Transition::Applied(polecat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn idle(name: &str, created_ts: u64) -> Polecat {
        Polecat::new("gastown", name, PathBuf::from(format!("/pool/{name}")), created_ts)
    }

    #[test]
    fn list_orders_by_creation_then_name() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        store.insert(idle("toast", 5)).unwrap();
        store.insert(idle("nux", 2)).unwrap();
        store.insert(idle("ace", 2)).unwrap();

        let names: Vec<_> = store
            .list_idle("gastown")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["ace", "nux", "toast"]);
    }

    #[test]
    fn list_of_unknown_rig_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        assert!(store.list("nowhere").unwrap().is_empty());
        assert!(store.rigs().unwrap().is_empty());
    }

    #[test]
    fn transitions_are_visible_to_later_snapshots() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        store.insert(idle("nux", 1)).unwrap();

        let claimed = store.try_claim("gastown", "nux").unwrap().applied().unwrap();
        assert_eq!(claimed.state, PolecatState::Claimed);
        assert!(store.list_idle("gastown").unwrap().is_empty());

        store
            .transition("gastown", "nux", PolecatState::Claimed, PolecatState::Idle)
            .unwrap();
        assert_eq!(store.list_idle("gastown").unwrap().len(), 1);
    }

    #[test]
    fn second_claim_conflicts() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        store.insert(idle("nux", 1)).unwrap();

        assert!(store.try_claim("gastown", "nux").unwrap().applied().is_some());
        assert_eq!(
            store.try_claim("gastown", "nux").unwrap(),
            Transition::Conflict {
                actual: Some(PolecatState::Claimed)
            }
        );
    }

    #[test]
    fn destroyed_records_are_hidden_and_name_is_reusable() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        store.insert(idle("nux", 1)).unwrap();
        assert!(store.insert(idle("nux", 2)).is_err());

        store
            .transition("gastown", "nux", PolecatState::Idle, PolecatState::Destroyed)
            .unwrap();
        assert!(store.get("gastown", "nux").unwrap().is_none());
        assert!(store.list("gastown").unwrap().is_empty());

        store.insert(idle("nux", 3)).unwrap();
        assert_eq!(store.get("gastown", "nux").unwrap().unwrap().created_ts, 3);
        assert_eq!(store.rigs().unwrap(), vec!["gastown"]);
    }

    #[test]
    fn corrupt_record_does_not_hide_the_pool() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        store.insert(idle("nux", 1)).unwrap();
        fs::write(store.rig_dir("gastown").join("broken.json"), "{not json").unwrap();

        let names: Vec<_> = store.list("gastown").unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["nux"]);
    }

    #[test]
    fn rejects_traversal_in_names() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path()).unwrap();
        assert!(store.get("..", "nux").is_err());
        assert!(store.try_claim("gastown", "../escape").is_err());
    }

    #[test]
    fn concurrent_claims_through_separate_handles_never_double_claim() {
        const POOL: usize = 3;
        const CLAIMERS: usize = 12;

        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        {
            let store = StateStore::new(&root).unwrap();
            for i in 0..POOL {
                store.insert(idle(&format!("p{i}"), i as u64)).unwrap();
            }
        }

        let barrier = Arc::new(Barrier::new(CLAIMERS));
        let handles: Vec<_> = (0..CLAIMERS)
            .map(|_| {
                let root = root.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // Each claimer opens its own store, like separate processes would.
                    let store = StateStore::new(root).unwrap();
                    let snapshot = store.list_idle("gastown").unwrap();
                    barrier.wait();
                    snapshot
                        .iter()
                        .find_map(|p| store.try_claim("gastown", &p.name).unwrap().applied())
                        .map(|p| p.name)
                })
            })
            .collect();

        let mut winners: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(winners.len(), POOL);
        winners.sort();
        winners.dedup();
        assert_eq!(winners.len(), POOL);
    }
}
