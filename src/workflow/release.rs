use anyhow::{Result, anyhow};
use tracing::info;

use super::SessionManager;
use crate::polecat::{Polecat, PolecatState};
use crate::registry::{Registry, Transition};
use crate::sling::SlingError;

/// Return a polecat to the idle pool.
///
/// Stops its session first, then moves Active back to Idle. A Claimed
/// polecat belongs to a dispatch that is still starting it and is refused.
pub fn release(
    registry: &dyn Registry,
    sessions: &dyn SessionManager,
    rig: &str,
    name: &str,
) -> Result<Polecat> {
    let polecat = registry
        .get(rig, name)?
        .ok_or_else(|| SlingError::PolecatNotFound {
            rig: rig.to_string(),
            name: name.to_string(),
        })?;

    match polecat.state {
        PolecatState::Idle => return Ok(polecat),
        PolecatState::Active => {}
        state => {
            return Err(anyhow!(
                "Polecat '{}' is {} by a dispatch still starting it; try again once it is active",
                name,
                state
            ));
        }
    }

    sessions.stop_session(&polecat)?;

    match registry.transition(rig, name, PolecatState::Active, PolecatState::Idle)? {
        Transition::Applied(released) => {
            info!(rig, name, "release:idle");
            Ok(released)
        }
        Transition::Conflict { actual } => Err(anyhow!(
            "Polecat '{}' changed state during release (now {})",
            name,
            actual.map_or("gone", |s| s.as_str())
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSessions {
        stopped: Mutex<Vec<String>>,
    }

    impl SessionManager for RecordingSessions {
        fn start_session(&self, _polecat: &Polecat) -> Result<()> {
            Ok(())
        }

        fn stop_session(&self, polecat: &Polecat) -> Result<()> {
            self.stopped.lock().unwrap().push(polecat.name.clone());
            Ok(())
        }
    }

    #[test]
    fn active_polecat_returns_to_idle() {
        let registry = MemoryRegistry::new();
        registry
            .insert(
                Polecat::new("gastown", "nux", PathBuf::from("/p/nux"), 1)
                    .with_state(PolecatState::Active),
            )
            .unwrap();
        let sessions = RecordingSessions::default();

        let released = release(&registry, &sessions, "gastown", "nux").unwrap();
        assert_eq!(released.state, PolecatState::Idle);
        assert_eq!(*sessions.stopped.lock().unwrap(), vec!["nux"]);
        assert_eq!(registry.list_idle("gastown").unwrap().len(), 1);
    }

    #[test]
    fn claimed_polecat_is_not_released() {
        let registry = MemoryRegistry::new();
        registry
            .insert(Polecat::new("gastown", "nux", PathBuf::from("/p/nux"), 1))
            .unwrap();
        registry.try_claim("gastown", "nux").unwrap();
        let sessions = RecordingSessions::default();

        let err = release(&registry, &sessions, "gastown", "nux").unwrap_err();
        assert!(err.to_string().contains("claimed"));
        assert!(sessions.stopped.lock().unwrap().is_empty());

        // The claiming dispatch keeps exclusive ownership.
        assert!(registry.try_claim("gastown", "nux").unwrap().applied().is_none());
        assert_eq!(
            registry.get("gastown", "nux").unwrap().unwrap().state,
            PolecatState::Claimed
        );
        assert!(
            registry
                .transition("gastown", "nux", PolecatState::Claimed, PolecatState::Active)
                .unwrap()
                .applied()
                .is_some()
        );
    }

    #[test]
    fn idle_polecat_is_left_alone() {
        let registry = MemoryRegistry::new();
        registry
            .insert(Polecat::new("gastown", "nux", PathBuf::from("/p/nux"), 1))
            .unwrap();
        let sessions = RecordingSessions::default();

        release(&registry, &sessions, "gastown", "nux").unwrap();
        assert!(sessions.stopped.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_polecat_is_not_found() {
        let registry = MemoryRegistry::new();
        let sessions = RecordingSessions::default();
        let err = release(&registry, &sessions, "gastown", "ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlingError>(),
            Some(SlingError::PolecatNotFound { .. })
        ));
    }
}
