use anyhow::Result;

use crate::config::Config;
use crate::workflow;

pub fn run(rig: &str, name: &str) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(&config)?;
    let sessions = super::sessions(&config);

    let polecat = workflow::release(store.as_ref(), sessions.as_ref(), rig, name)?;
    println!("✓ Polecat '{}' in rig '{}' is idle", polecat.name, polecat.rig);
    Ok(())
}
