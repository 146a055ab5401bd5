use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tracing::info;

use super::args::SlingArgs;
use crate::cmd;
use crate::config::Config;
use crate::events::EventLog;
use crate::sling::{Decision, Dispatcher, SlingOutcome};
use crate::workflow::{GitProvisioner, GitStatusCheck};

pub fn run(args: SlingArgs) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(&config)?;
    let default_preference = config
        .default_preference()
        .context("Invalid 'default_preference' in config")?;

    let dispatcher = Dispatcher {
        registry: store.clone(),
        provisioner: Arc::new(GitProvisioner::new(config.clone(), store.clone())),
        sessions: super::sessions(&config),
        events: Arc::new(EventLog::new(store.root().join("events.jsonl"))),
        checker: Arc::new(GitStatusCheck),
        default_preference,
    };

    let outcome = dispatcher.sling(&args.request())?;
    report(&args.rig, &outcome);

    follow_up(&args.command, &outcome)
}

/// Run the trailing command inside the selected polecat's clone.
fn follow_up(command: &[String], outcome: &SlingOutcome) -> Result<()> {
    if command.is_empty() || outcome.dry_run {
        return Ok(());
    }
    let (Some(polecat), Some(workdir)) = (outcome.polecat(), outcome.workdir()) else {
        return Ok(());
    };
    info!(rig = %polecat.rig, name = %polecat.name, command = ?command, "sling:follow-up");
    cmd::run_in_dir(
        command,
        workdir,
        &[
            ("POLECAT_NAME", polecat.name.as_str()),
            ("POLECAT_RIG", polecat.rig.as_str()),
        ],
    )
}

fn report(rig: &str, outcome: &SlingOutcome) {
    for warning in &outcome.warnings {
        eprintln!("{} {}", style("warning:").yellow().bold(), warning);
    }

    if outcome.dry_run {
        match &outcome.decision {
            Decision::Reuse(polecat) => println!(
                "Would reuse polecat {} in rig '{}' (prefer: {})\n  Path: {}",
                style(&polecat.name).cyan(),
                rig,
                outcome.preference,
                polecat.clone_path.display()
            ),
            Decision::Fresh(_) => println!("Would create a fresh polecat in rig '{}'", rig),
        }
        return;
    }

    let Some(polecat) = outcome.polecat() else {
        return;
    };
    let verb = match outcome.decision {
        Decision::Reuse(_) => "Reused",
        Decision::Fresh(_) => "Created",
    };
    println!(
        "{} {} polecat {} in rig '{}'",
        style("✓").green(),
        verb,
        style(&polecat.name).cyan(),
        rig
    );
    println!("  Path: {}", polecat.clone_path.display());
    if let Some(branch) = polecat.branch.as_deref() {
        println!("  Branch: {}", branch);
    }
    if outcome.session_started {
        println!("  Session: started");
    } else {
        println!("  Session: not started (polecat left idle)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polecat::{Polecat, Preference};
    use tempfile::TempDir;

    fn outcome(decision: Decision, dry_run: bool) -> SlingOutcome {
        SlingOutcome {
            decision,
            preference: Preference::Any,
            session_started: true,
            dry_run,
            warnings: Vec::new(),
        }
    }

    fn marker_command() -> Vec<String> {
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf %s \"$POLECAT_RIG/$POLECAT_NAME\" > marker".to_string(),
        ]
    }

    #[test]
    fn follow_up_runs_in_the_polecat_clone() {
        let temp = TempDir::new().unwrap();
        let polecat = Polecat::new("gastown", "nux", temp.path().to_path_buf(), 1);

        follow_up(&marker_command(), &outcome(Decision::Reuse(polecat), false)).unwrap();

        let marker = std::fs::read_to_string(temp.path().join("marker")).unwrap();
        assert_eq!(marker, "gastown/nux");
    }

    #[test]
    fn follow_up_is_skipped_on_dry_run() {
        let temp = TempDir::new().unwrap();
        let polecat = Polecat::new("gastown", "nux", temp.path().to_path_buf(), 1);

        follow_up(&marker_command(), &outcome(Decision::Reuse(polecat), true)).unwrap();
        follow_up(&marker_command(), &outcome(Decision::Fresh(None), false)).unwrap();

        assert!(!temp.path().join("marker").exists());
    }
}
