//! Dispatch ("sling"): route a unit of work into a polecat of a rig.
//!
//! Intent is resolved once from the flags, idle polecats are ranked by the
//! locator, and the claim coordinator takes at most one of them. If the
//! unfiltered pool is exhausted a fresh polecat is provisioned instead.
//! Dry-run follows the exact same path with the claim step made inert.

pub mod claim;
pub mod intent;
pub mod locator;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::events::{EventKind, EventSink};
use crate::polecat::{Polecat, PolecatState, Preference, UnknownPreference};
use crate::registry::{Registry, Transition};
use crate::workflow::{CleanlinessCheck, Provisioner, SessionManager};

use claim::ClaimMode;
use intent::{Flags, Intent, Mode};
use locator::SelectionRequest;

/// User-facing errors. All of them exit non-zero without mutating anything.
#[derive(Debug, thiserror::Error)]
pub enum SlingError {
    #[error(transparent)]
    UnknownPreference(#[from] UnknownPreference),

    #[error("no idle polecat named '{name}' in rig '{rig}'")]
    PolecatNotFound { rig: String, name: String },

    #[error("unknown rig '{0}': add it under 'rigs:' in .polecats.yaml")]
    UnknownRig(String),
}

/// A dispatch request as given by the user.
#[derive(Debug, Clone, Default)]
pub struct SlingRequest {
    pub rig: String,
    pub reuse: bool,
    /// Exact polecat name to reuse.
    pub name: Option<String>,
    /// Raw preference string; validated here, not by the caller.
    pub preference: Option<String>,
    pub no_session: bool,
    pub dry_run: bool,
}

/// The decision reached for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Reuse(Polecat),
    /// Fresh polecat; `None` under dry-run since nothing was created.
    Fresh(Option<Polecat>),
}

#[derive(Debug, Clone)]
pub struct SlingOutcome {
    pub decision: Decision,
    pub preference: Preference,
    pub session_started: bool,
    pub dry_run: bool,
    pub warnings: Vec<&'static str>,
}

impl SlingOutcome {
    pub fn kind(&self) -> EventKind {
        match self.decision {
            Decision::Reuse(_) => EventKind::Reused,
            Decision::Fresh(_) => EventKind::Fresh,
        }
    }

    pub fn polecat(&self) -> Option<&Polecat> {
        match &self.decision {
            Decision::Reuse(p) => Some(p),
            Decision::Fresh(p) => p.as_ref(),
        }
    }

    /// Where follow-up commands must run: the selected polecat's clone.
    pub fn workdir(&self) -> Option<&Path> {
        self.polecat().map(|p| p.clone_path.as_path())
    }
}

/// Wires the engine to its registry and collaborators.
pub struct Dispatcher {
    pub registry: Arc<dyn Registry>,
    pub provisioner: Arc<dyn Provisioner>,
    pub sessions: Arc<dyn SessionManager>,
    pub events: Arc<dyn EventSink>,
    pub checker: Arc<dyn CleanlinessCheck>,
    pub default_preference: Preference,
}

impl Dispatcher {
    pub fn sling(&self, request: &SlingRequest) -> Result<SlingOutcome> {
        let intent = intent::resolve(&Flags {
            reuse: request.reuse,
            named: request.name.is_some(),
            preference: request.preference.is_some(),
            no_session: request.no_session,
        });
        for warning in &intent.warnings {
            warn!(rig = %request.rig, warning, "sling:flag conflict");
        }

        let preference = match request.preference.as_deref() {
            Some(raw) => raw.parse::<Preference>().map_err(SlingError::from)?,
            None => self.default_preference,
        };

        // Dry-run and live must agree on an unknown rig.
        self.provisioner.check_rig(&request.rig)?;

        let mode = if request.dry_run {
            ClaimMode::DryRun
        } else {
            ClaimMode::Live
        };

        info!(
            rig = %request.rig,
            mode = ?intent.mode,
            name = ?request.name,
            preference = %preference,
            dry_run = request.dry_run,
            "sling:start"
        );

        let selected = match intent.mode {
            Mode::Reuse => self.select(request, preference, mode)?,
            Mode::Fresh => None,
        };

        let outcome = |decision: Decision, session_started: bool| SlingOutcome {
            decision,
            preference,
            session_started,
            dry_run: request.dry_run,
            warnings: intent.warnings.clone(),
        };

        if request.dry_run {
            let decision = match selected {
                Some(polecat) => Decision::Reuse(polecat),
                None => Decision::Fresh(None),
            };
            return Ok(outcome(decision, intent.start_session));
        }

        match selected {
            Some(claimed) => {
                let active = self.activate(claimed)?;
                self.record(EventKind::Reused, &active);
                Ok(outcome(Decision::Reuse(active), true))
            }
            None => {
                let (polecat, started) = self.create_fresh(&request.rig, &intent)?;
                self.record(EventKind::Fresh, &polecat);
                Ok(outcome(Decision::Fresh(Some(polecat)), started))
            }
        }
    }

    /// Rank and take one idle polecat. `None` means fall back to fresh.
    fn select(
        &self,
        request: &SlingRequest,
        preference: Preference,
        mode: ClaimMode,
    ) -> Result<Option<Polecat>> {
        let candidates = locator::locate(
            self.registry.as_ref(),
            self.checker.as_ref(),
            SelectionRequest {
                rig: &request.rig,
                name: request.name.as_deref(),
                preference,
            },
        )?;

        let selected = mode.select(self.registry.as_ref(), &candidates)?;

        // A named miss is never papered over with a fresh polecat.
        if selected.is_none()
            && let Some(name) = request.name.as_deref()
        {
            return Err(SlingError::PolecatNotFound {
                rig: request.rig.clone(),
                name: name.to_string(),
            }
            .into());
        }

        if selected.is_none() {
            debug!(rig = %request.rig, candidates = candidates.len(), "sling:pool exhausted");
        }
        Ok(selected)
    }

    /// Start a session on a claimed polecat and mark it Active.
    /// On failure the polecat goes back to Idle and the error is surfaced.
    fn activate(&self, claimed: Polecat) -> Result<Polecat> {
        if let Err(e) = self.sessions.start_session(&claimed) {
            self.rollback(&claimed);
            return Err(e.context(format!(
                "Failed to start a session for polecat '{}'",
                claimed.name
            )));
        }

        match self.registry.transition(
            &claimed.rig,
            &claimed.name,
            PolecatState::Claimed,
            PolecatState::Active,
        )? {
            Transition::Applied(mut active) => {
                active.cleanliness = claimed.cleanliness;
                info!(rig = %active.rig, name = %active.name, "sling:active");
                Ok(active)
            }
            Transition::Conflict { actual } => Err(anyhow!(
                "Polecat '{}' changed state while its session was starting (now {})",
                claimed.name,
                actual.map_or("gone", |s| s.as_str())
            )),
        }
    }

    fn rollback(&self, claimed: &Polecat) {
        match self.registry.transition(
            &claimed.rig,
            &claimed.name,
            PolecatState::Claimed,
            PolecatState::Idle,
        ) {
            Ok(Transition::Applied(_)) => {
                info!(rig = %claimed.rig, name = %claimed.name, "sling:rolled back to idle")
            }
            Ok(Transition::Conflict { actual }) => warn!(
                rig = %claimed.rig,
                name = %claimed.name,
                actual = ?actual,
                "sling:rollback conflict"
            ),
            Err(e) => warn!(
                rig = %claimed.rig,
                name = %claimed.name,
                error = %e,
                "sling:rollback failed"
            ),
        }
    }

    /// Provision and (unless suppressed) start a fresh polecat. The
    /// provisioner hands it back already registered as Claimed.
    fn create_fresh(&self, rig: &str, intent: &Intent) -> Result<(Polecat, bool)> {
        let claimed = self
            .provisioner
            .create_fresh(rig)
            .with_context(|| format!("Failed to create a fresh polecat in rig '{}'", rig))?;

        if intent.start_session {
            return Ok((self.activate(claimed)?, true));
        }

        match self.registry.transition(
            rig,
            &claimed.name,
            PolecatState::Claimed,
            PolecatState::Idle,
        )? {
            Transition::Applied(idle) => {
                info!(rig, name = %idle.name, "sling:fresh idle");
                Ok((idle, false))
            }
            Transition::Conflict { actual } => Err(anyhow!(
                "Fresh polecat '{}' changed state before it was handed out (now {})",
                claimed.name,
                actual.map_or("gone", |s| s.as_str())
            )),
        }
    }

    fn record(&self, kind: EventKind, polecat: &Polecat) {
        if let Err(e) = self.events.record(kind, &polecat.rig, &polecat.name) {
            warn!(
                rig = %polecat.rig,
                name = %polecat.name,
                error = %e,
                "sling:event not recorded"
            );
        }
    }
}
