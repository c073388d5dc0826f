//! Catalog loading and the NDJSON activity feed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use deck_core::Catalog;
use deck_state::Intent;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const MAX_PENDING_BYTES: usize = 64 * 1024;

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    // A producer truncating before rewrite shows up as an empty read; keep
    // the previous catalog rather than pruning every pin against nothing.
    if raw.trim().is_empty() {
        anyhow::bail!("catalog {} is empty", path.display());
    }
    Catalog::from_json(&raw).with_context(|| format!("parsing catalog {}", path.display()))
}

/// Watches the directories holding `paths`; each change event becomes one
/// wake-up on the returned channel. Bursts collapse into a single pending
/// notification.
pub fn setup_watcher(paths: &[&Path]) -> (Option<RecommendedWatcher>, Option<mpsc::Receiver<()>>) {
    let (tx, rx) = mpsc::channel(1);
    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx.try_send(());
            }
        },
        Config::default(),
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(event = "watcher_unavailable", error = %err);
            return (None, None);
        }
    };

    let mut watched = false;
    for path in paths {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if dir.exists() && watcher.watch(dir, RecursiveMode::NonRecursive).is_ok() {
            watched = true;
        }
    }
    if !watched {
        return (None, None);
    }
    (Some(watcher), Some(rx))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ActivityKind {
    UserInput,
    AgentOutput,
    AgentStopped,
}

#[derive(Debug, Deserialize)]
struct ActivityRecord {
    session_id: String,
    kind: ActivityKind,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    fn into_intent(self, now: DateTime<Utc>) -> Intent {
        let at = self.at.unwrap_or(now);
        let session_id = self.session_id;
        match self.kind {
            ActivityKind::UserInput => Intent::UserInput { session_id },
            ActivityKind::AgentOutput => Intent::AgentOutput { session_id, at },
            ActivityKind::AgentStopped => Intent::AgentStopped { session_id, at },
        }
    }
}

/// Tails an append-only NDJSON file by byte offset. A file that shrinks is
/// treated as rotated and read again from the start.
#[derive(Debug)]
pub struct ActivityFeed {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
}

impl ActivityFeed {
    /// Starts at the current end of the file so history is not replayed.
    pub fn open(path: PathBuf) -> Self {
        let offset = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        Self {
            path,
            offset,
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Intent> {
        let chunk = match self.read_new_bytes() {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(
                    event = "activity_feed_unreadable",
                    path = %self.path.display(),
                    error = %err
                );
                return Vec::new();
            }
        };
        if chunk.is_empty() {
            return Vec::new();
        }
        self.pending.extend_from_slice(&chunk);

        let mut intents = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityRecord>(text) {
                Ok(record) => intents.push(record.into_intent(now)),
                Err(err) => warn!(event = "activity_line_invalid", error = %err),
            }
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(event = "activity_line_oversized", size = self.pending.len());
            self.pending.clear();
        }
        intents
    }

    fn read_new_bytes(&mut self) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            debug!(event = "activity_feed_rotated", path = %self.path.display());
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.take(len - self.offset).read_to_end(&mut buf)?;
        self.offset += buf.len() as u64;
        Ok(buf)
    }
}
