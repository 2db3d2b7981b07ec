//! Event journal for baton.
//!
//! Every dispatch, publish, announce, poll result and sync is appended to
//! `<state_dir>/events.ndjson`, one JSON object per line, so a run can be
//! reconstructed later from any machine that shares the state directory.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`dispatch`, `publish`, `merge`, ...)
//! - `actor`: `user@HOST`
//! - `task`: the task branch, when the event belongs to one
//! - `details`: freeform object with action-specific details
//!
//! Journal writes are best-effort from the command layer: see
//! [`Journal::record`].

use crate::best_effort::{self, BestEffort, SkippedStep};
use crate::error::{BatonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the journal inside the state directory.
pub const EVENTS_FILE_NAME: &str = "events.ndjson";

/// Actions that can be journaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A dispatch started for a new or resumed task branch.
    Dispatch,
    /// The task branch was created or found.
    Provision,
    /// Local changes were published (primary or fallback transport).
    Publish,
    /// The pull request and trigger comment were posted.
    Announce,
    /// The completion predicate became true.
    PollDone,
    /// The poll deadline expired.
    PollTimeout,
    /// A single managed pull request was merged or failed to merge.
    Merge,
    /// A sync invocation finished.
    Sync,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Dispatch => write!(f, "dispatch"),
            EventAction::Provision => write!(f, "provision"),
            EventAction::Publish => write!(f, "publish"),
            EventAction::Announce => write!(f, "announce"),
            EventAction::PollDone => write!(f, "poll_done"),
            EventAction::PollTimeout => write!(f, "poll_timeout"),
            EventAction::Merge => write!(f, "merge"),
            EventAction::Sync => write!(f, "sync"),
        }
    }
}

/// A journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,

    /// Task branch this event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and local actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            task: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, branch: impl Into<String>) -> Self {
        self.task = Some(branch.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BatonError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append-only NDJSON journal rooted at a state directory.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(EVENTS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, creating the journal and its directory if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                BatonError::UserError(format!(
                    "failed to create state directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                BatonError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line)
            .and_then(|_| file.sync_all())
            .map_err(|e| {
                BatonError::UserError(format!(
                    "failed to write event to '{}': {}",
                    self.path.display(),
                    e
                ))
            })
    }

    /// Append an event as a best-effort step. A failure is logged and
    /// returned as a skipped step; it never fails the caller.
    pub fn record(&self, event: &Event) -> Option<SkippedStep> {
        best_effort::attempt(BestEffort::JournalAppend, self.append(event)).err()
    }
}
