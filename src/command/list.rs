use anyhow::Result;
use pathdiff::diff_paths;
use serde::Serialize;
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Padding, Style, object::Columns},
};

use crate::config::Config;
use crate::polecat::{Polecat, PolecatState};
use crate::registry::Registry;

#[derive(Tabled)]
struct PolecatRow {
    #[tabled(rename = "RIG")]
    rig: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "BRANCH")]
    branch: String,
    #[tabled(rename = "PATH")]
    path_str: String,
}

#[derive(Serialize)]
struct ListOutput<'a> {
    polecats: &'a [Polecat],
}

pub fn run(rig: Option<&str>, idle_only: bool, json: bool) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(&config)?;
    let polecats = collect(store.as_ref(), rig, idle_only)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ListOutput {
                polecats: &polecats
            })?
        );
        return Ok(());
    }

    if polecats.is_empty() {
        println!("No polecats found");
        return Ok(());
    }

    let current_dir = std::env::current_dir()?;
    let rows: Vec<PolecatRow> = polecats
        .into_iter()
        .map(|p| PolecatRow {
            path_str: display_path(&p.clone_path, &current_dir),
            branch: p.branch.unwrap_or_else(|| "-".to_string()),
            state: p.state.to_string(),
            name: p.name,
            rig: p.rig,
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::blank())
        .modify(Columns::new(0..5), Padding::new(0, 1, 0, 0));
    println!("{table}");

    Ok(())
}

/// Polecats of one rig, or of every rig, ordered by rig then creation.
fn collect(registry: &dyn Registry, rig: Option<&str>, idle_only: bool) -> Result<Vec<Polecat>> {
    let rigs = match rig {
        Some(rig) => vec![rig.to_string()],
        None => registry.rigs()?,
    };

    let mut polecats = Vec::new();
    for rig in &rigs {
        polecats.extend(
            registry
                .list(rig)?
                .into_iter()
                .filter(|p| !idle_only || p.state == PolecatState::Idle),
        );
    }
    Ok(polecats)
}

fn display_path(path: &Path, current_dir: &Path) -> String {
    diff_paths(path, current_dir)
        .map(|p| {
            let s = p.display().to_string();
            if s.is_empty() || s == "." {
                "(here)".to_string()
            } else {
                s
            }
        })
        .unwrap_or_else(|| path.display().to_string())
}
