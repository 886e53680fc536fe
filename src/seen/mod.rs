//! "Last seen" activity tracking.
//!
//! The session records one [`SeenEntry`] per sender nick on every user
//! message; the `seen` command reads them back. The store is an external
//! collaborator behind the [`SeenStore`] trait; the default implementation
//! keeps a single JSON map on disk, rewritten on every record, and degrades
//! to in-memory operation when the file cannot be written.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// One recorded sighting of a nick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenEntry {
    pub date: DateTime<Utc>,
    pub message: String,
    pub channel: String,
}

pub trait SeenStore: Send + Sync {
    fn record(&self, nick: &str, entry: SeenEntry);
    fn lookup(&self, nick: &str) -> Option<SeenEntry>;
}

/// In-memory store, used in tests and as a fallback.
#[derive(Default)]
pub struct MemorySeenStore {
    map: Mutex<HashMap<String, SeenEntry>>,
}

impl SeenStore for MemorySeenStore {
    fn record(&self, nick: &str, entry: SeenEntry) {
        self.map.lock().insert(nick.to_owned(), entry);
    }

    fn lookup(&self, nick: &str) -> Option<SeenEntry> {
        self.map.lock().get(nick).cloned()
    }
}

/// JSON-file-backed store.
pub struct JsonSeenStore {
    path: PathBuf,
    map: Mutex<HashMap<String, SeenEntry>>,
}

impl JsonSeenStore {
    /// Open the store, loading any existing file.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let map = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            HashMap::new()
        };
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    fn flush(&self, map: &HashMap<String, SeenEntry>) {
        let contents = match serde_json::to_string_pretty(map) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "could not serialize seen store");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, contents) {
            warn!(path = %self.path.display(), error = %e, "could not write seen store");
        }
    }
}

impl SeenStore for JsonSeenStore {
    fn record(&self, nick: &str, entry: SeenEntry) {
        let mut map = self.map.lock();
        map.insert(nick.to_owned(), entry);
        self.flush(&map);
    }

    fn lookup(&self, nick: &str) -> Option<SeenEntry> {
        self.map.lock().get(nick).cloned()
    }
}

/// Render how long ago `then` was, coarsely.
pub fn humanize_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => plural(secs / 60, "minute"),
        3600..=86_399 => plural(secs / 3600, "hour"),
        _ => plural(secs / 86_400, "day"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
