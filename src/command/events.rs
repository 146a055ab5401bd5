use anyhow::Result;

use crate::config::Config;
use crate::events::{Event, EventLog};

pub fn run(rig: Option<&str>, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let store = super::open_store(&config)?;
    let log = EventLog::new(store.root().join("events.jsonl"));

    let events = tail(log.read_all()?, rig, limit);
    if events.is_empty() {
        println!("No dispatch events recorded");
        return Ok(());
    }
    for event in events {
        println!("{}  {:<6}  {}/{}", event.ts, event.kind.as_str(), event.rig, event.polecat);
    }
    Ok(())
}

/// The last `limit` events, optionally for one rig, oldest first.
fn tail(events: Vec<Event>, rig: Option<&str>, limit: usize) -> Vec<Event> {
    let mut events: Vec<Event> = events
        .into_iter()
        .filter(|e| rig.is_none_or(|rig| e.rig == rig))
        .collect();
    let skip = events.len().saturating_sub(limit);
    events.drain(..skip);
    events
}
