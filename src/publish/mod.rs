//! Publish pipeline.
//!
//! Delivers a committed change set to the remote task branch in two stages:
//! the primary transport (a bulk push) and, only when that does not succeed,
//! the per-file content API for every file in the set. The outcome always
//! enumerates which files made it and which did not.

pub mod transport;


pub use transport::{GitPushTransport, PushAttempt, PushTransport, credentialed_url};

use crate::error::Result;
use crate::remote::{ContentUpdate, RemoteRepository};
use crate::working_copy::changes::filter_to_scope;
use crate::working_copy::{ChangeKind, LocalWorkingCopy, PathScope};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where a pending file's bytes come from.
#[derive(Debug, Clone)]
enum FileSource {
    InMemory(Vec<u8>),
    OnDisk(PathBuf),
    Deleted,
}

/// One file to deliver.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub path: String,
    source: FileSource,
}

impl PendingFile {
    pub fn in_memory(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            source: FileSource::InMemory(content.into()),
        }
    }

    pub fn on_disk(path: impl Into<String>, full_path: PathBuf) -> Self {
        Self {
            path: path.into(),
            source: FileSource::OnDisk(full_path),
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: FileSource::Deleted,
        }
    }

    fn bytes(&self) -> std::result::Result<Vec<u8>, String> {
        match &self.source {
            FileSource::InMemory(bytes) => Ok(bytes.clone()),
            FileSource::OnDisk(full) => std::fs::read(full)
                .map_err(|e| format!("failed to read '{}': {}", full.display(), e)),
            FileSource::Deleted => Err(
                "deleted locally; the content transport can only create or replace files"
                    .to_string(),
            ),
        }
    }
}

/// The files a publish call is responsible for.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    files: Vec<PendingFile>,
}

impl ChangeSet {
    pub fn new(files: Vec<PendingFile>) -> Self {
        Self { files }
    }

    /// Files committed on the working copy's HEAD since `since`, limited to `scope`.
    pub fn from_working_copy(
        copy: &LocalWorkingCopy,
        since: &str,
        scope: Option<&PathScope>,
    ) -> Result<Self> {
        let changed = filter_to_scope(copy.changed_files(since)?, scope);
        let files = changed
            .into_iter()
            .map(|file| match file.kind {
                ChangeKind::Deleted => PendingFile::deleted(file.path),
                ChangeKind::Added | ChangeKind::Modified => {
                    let full = copy.path().join(&file.path);
                    PendingFile::on_disk(file.path, full)
                }
            })
            .collect();
        Ok(Self { files })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Which transport delivered the change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Nothing to deliver.
    None,
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub reason: String,
}

/// Per-call publish accounting. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub attempted: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub transport: Transport,
    /// How the primary transport ended, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<PushAttempt>,
}

impl PublishOutcome {
    fn empty() -> Self {
        Self {
            attempted: Vec::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            transport: Transport::None,
            primary: None,
        }
    }

    /// Every attempted file is confirmed on the remote branch.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == self.attempted.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.is_complete()
    }
}

/// Deliver `changes` to `branch`.
///
/// `primary` is `None` when there is no local working copy to push from; the
/// content API is then the only transport. A constructed `remote` implies a
/// resolved credential, so there is no unauthenticated path through here.
pub fn publish(
    remote: &dyn RemoteRepository,
    primary: Option<&dyn PushTransport>,
    branch: &str,
    changes: &ChangeSet,
    message: &str,
) -> PublishOutcome {
    if changes.is_empty() {
        debug!(branch = %branch, "nothing to publish");
        return PublishOutcome::empty();
    }

    let attempted = changes.paths();

    let primary_attempt = primary.map(|transport| transport.push(branch));
    if let Some(PushAttempt::Pushed) = &primary_attempt {
        info!(branch = %branch, files = attempted.len(), "published with push");
        return PublishOutcome {
            succeeded: attempted.clone(),
            attempted,
            failed: Vec::new(),
            transport: Transport::Primary,
            primary: primary_attempt,
        };
    }

    if primary_attempt.is_some() {
        warn!(branch = %branch, "push failed; uploading files individually");
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for file in &changes.files {
        match upload_file(remote, branch, file, message) {
            Ok(()) => {
                debug!(file = %file.path, "uploaded");
                succeeded.push(file.path.clone());
            }
            Err(reason) => {
                warn!(file = %file.path, reason = %reason, "upload failed");
                failed.push(FailedFile {
                    path: file.path.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        branch = %branch,
        succeeded = succeeded.len(),
        failed = failed.len(),
        "published with content API"
    );

    PublishOutcome {
        attempted,
        succeeded,
        failed,
        transport: Transport::Fallback,
        primary: primary_attempt,
    }
}

/// Upload one file, replacing the remote copy by its revision marker when present.
fn upload_file(
    remote: &dyn RemoteRepository,
    branch: &str,
    file: &PendingFile,
    message: &str,
) -> std::result::Result<(), String> {
    let content = file.bytes()?;

    let existing = remote
        .get_content(branch, &file.path)
        .map_err(|e| format!("reading remote metadata: {}", e))?;

    remote
        .put_content(&ContentUpdate {
            branch,
            path: &file.path,
            content: &content,
            message,
            sha: existing.as_ref().map(|meta| meta.sha.as_str()),
        })
        .map_err(|e| format!("uploading content: {}", e))
}
