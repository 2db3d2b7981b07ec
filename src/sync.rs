//! Sync reconciler.
//!
//! Lists open pull requests against the base branch, keeps the ones baton
//! recognizes as its own, merges them one by one with an explicit strategy,
//! and optionally fast-forwards a local working copy afterwards. Per-item
//! failures are collected, never raised.

use crate::config::{Config, MergeStrategy};
use crate::error::{BatonError, Result};
use crate::remote::{PullRequest, RemoteError, RemoteRepository};
use crate::working_copy::{FastForward, LocalWorkingCopy};
use serde::Serialize;
use tracing::{info, warn};

/// The conventions that identify a pull request opened by baton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRules {
    pub branch_prefix: String,
    pub label: String,
    pub title_marker: String,
}

impl ManagedRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            branch_prefix: config.branch_prefix.clone(),
            label: config.managed_label.clone(),
            title_marker: config.title_marker.clone(),
        }
    }
}

/// A pull request is managed when its head branch starts with the branch
/// prefix, OR it carries the managed label, OR its title contains the title
/// marker. Empty rules never match.
pub fn is_managed_request(pr: &PullRequest, rules: &ManagedRules) -> bool {
    let by_prefix = !rules.branch_prefix.is_empty() && pr.head_ref.starts_with(&rules.branch_prefix);
    let by_label = !rules.label.is_empty() && pr.has_label(&rules.label);
    let by_title = !rules.title_marker.is_empty() && pr.title.contains(&rules.title_marker);
    by_prefix || by_label || by_title
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeFailureKind {
    Conflict,
    PermissionDenied,
    Other,
}

impl MergeFailureKind {
    fn classify(error: &RemoteError) -> Self {
        if error.is_merge_conflict() {
            MergeFailureKind::Conflict
        } else if error.is_permission_denied() {
            MergeFailureKind::PermissionDenied
        } else {
            MergeFailureKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeFailure {
    pub number: u64,
    pub kind: MergeFailureKind,
    pub reason: String,
}

/// What happened to the local working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LocalUpdate {
    NotRequested,
    /// A pull was requested but no working copy path was given.
    NoWorkingCopy,
    UpToDate { sha: String },
    FastForwarded { from: String, to: String },
    /// Local history diverged from the remote base; left untouched.
    NotFastForward { local: String, remote: String },
    Failed { reason: String },
}

impl LocalUpdate {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            LocalUpdate::UpToDate { .. } | LocalUpdate::FastForwarded { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub merge: bool,
    pub pull_local: bool,
    pub strategy: MergeStrategy,
}

/// Result of one sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub base: String,
    pub strategy: MergeStrategy,
    /// Managed pull requests found open against base.
    pub candidates: Vec<u64>,
    pub merged: Vec<u64>,
    pub failed: Vec<MergeFailure>,
    /// Open pull requests against base that were left alone.
    pub skipped_unmanaged: Vec<u64>,
    pub local_update: LocalUpdate,
}

impl SyncResult {
    pub fn local_pull_succeeded(&self) -> bool {
        self.local_update.succeeded()
    }

    /// Some merge failed, or a requested local update did not succeed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
            || (!matches!(self.local_update, LocalUpdate::NotRequested)
                && !self.local_pull_succeeded())
    }
}

/// Reconcile managed pull requests on `base`.
///
/// Only a failure to list pull requests is fatal.
pub fn sync(
    remote: &dyn RemoteRepository,
    base: &str,
    options: SyncOptions,
    rules: &ManagedRules,
    copy: Option<&LocalWorkingCopy>,
) -> Result<SyncResult> {
    let open = remote
        .list_open_pull_requests(base)
        .map_err(|e| BatonError::remote(format!("listing open pull requests on '{}'", base), e))?;

    let (managed, unmanaged): (Vec<_>, Vec<_>) =
        open.into_iter().partition(|pr| is_managed_request(pr, rules));

    info!(
        base = %base,
        managed = managed.len(),
        unmanaged = unmanaged.len(),
        "found open pull requests"
    );

    let mut merged = Vec::new();
    let mut failed = Vec::new();

    if options.merge {
        for pr in &managed {
            match remote.merge_pull_request(pr.number, options.strategy) {
                Ok(outcome) => {
                    info!(number = pr.number, sha = ?outcome.sha, "merged pull request");
                    merged.push(pr.number);
                }
                Err(e) => {
                    warn!(number = pr.number, error = %e, "merge failed");
                    failed.push(MergeFailure {
                        number: pr.number,
                        kind: MergeFailureKind::classify(&e),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    let local_update = if !options.pull_local {
        LocalUpdate::NotRequested
    } else {
        match copy {
            None => LocalUpdate::NoWorkingCopy,
            Some(copy) => update_local(copy, base),
        }
    };

    Ok(SyncResult {
        base: base.to_string(),
        strategy: options.strategy,
        candidates: managed.iter().map(|pr| pr.number).collect(),
        merged,
        failed,
        skipped_unmanaged: unmanaged.iter().map(|pr| pr.number).collect(),
        local_update,
    })
}

fn update_local(copy: &LocalWorkingCopy, base: &str) -> LocalUpdate {
    match copy.fast_forward(base) {
        Ok(FastForward::UpToDate { sha }) => LocalUpdate::UpToDate { sha },
        Ok(FastForward::Advanced { from, to }) => LocalUpdate::FastForwarded { from, to },
        Ok(FastForward::Diverged { local, remote }) => {
            warn!(base = %base, "local base has diverged; not fast-forwarding");
            LocalUpdate::NotFastForward { local, remote }
        }
        Err(e) => {
            warn!(error = %e, "local update failed");
            LocalUpdate::Failed {
                reason: e.to_string(),
            }
        }
    }
}
