//! Activity feed for dispatch outcomes.
//!
//! Recording is best-effort: callers log failures and carry on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::polecat::now_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reused,
    Fresh,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Reused => "reused",
            EventKind::Fresh => "fresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub ts: u64,
    pub kind: EventKind,
    pub rig: String,
    pub polecat: String,
}

pub trait EventSink: Send + Sync {
    fn record(&self, kind: EventKind, rig: &str, polecat: &str) -> Result<()>;
}

/// Appends one JSON object per line to `<state_dir>/events.jsonl`.
pub struct EventLog {
    path: PathBuf,
    // Serializes appends from threads sharing this handle; O_APPEND covers processes.
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn read_all(&self) -> Result<Vec<Event>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read event log"),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed event log line"))
            .collect()
    }
}

impl EventSink for EventLog {
    fn record(&self, kind: EventKind, rig: &str, polecat: &str) -> Result<()> {
        let event = Event {
            ts: now_ts(),
            kind,
            rig: rig.to_string(),
            polecat: polecat.to_string(),
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open event log {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_and_reads_back_events() {
        let temp = TempDir::new().unwrap();
        let log = EventLog::new(temp.path().join("nested").join("events.jsonl"));
        assert!(log.read_all().unwrap().is_empty());

        log.record(EventKind::Fresh, "gastown", "nux").unwrap();
        log.record(EventKind::Reused, "gastown", "toast").unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Fresh);
        assert_eq!(events[1].polecat, "toast");
    }

    #[test]
    fn serializes_kind_in_lowercase() {
        let json = serde_json::to_string(&EventKind::Reused).unwrap();
        assert_eq!(json, "\"reused\"");
    }
}
