//! Named best-effort steps.
//!
//! A handful of operations are allowed to fail without failing the command.
//! Each one goes through [`attempt`] with its own [`BestEffort`] kind, so the
//! tolerated failures are enumerable and visible in reports, and every other
//! failure still propagates.

use serde::Serialize;
use std::fmt;

/// The operations whose failure is logged and tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BestEffort {
    /// Opening the advisory tracking issue next to the pull request.
    AdvisoryIssue,
    /// Adding the managed labels to the pull request.
    RequestLabels,
    /// Appending to the event journal.
    JournalAppend,
    /// Writing `last_dispatch.json`.
    ReportWrite,
    /// Restoring the working copy's remote URL after a credentialed push.
    RemoteUrlRestore,
}

impl fmt::Display for BestEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BestEffort::AdvisoryIssue => "advisory_issue",
            BestEffort::RequestLabels => "request_labels",
            BestEffort::JournalAppend => "journal_append",
            BestEffort::ReportWrite => "report_write",
            BestEffort::RemoteUrlRestore => "remote_url_restore",
        };
        f.write_str(name)
    }
}

/// A best-effort step that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStep {
    pub step: BestEffort,
    pub reason: String,
}

/// Run the outcome of a best-effort step through the tolerance path.
///
/// Failures are logged at `warn` and returned as a [`SkippedStep`] for the
/// caller to report; they are never propagated as errors.
pub fn attempt<T, E: fmt::Display>(
    step: BestEffort,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, SkippedStep> {
    result.map_err(|e| {
        tracing::warn!(step = %step, error = %e, "best-effort step failed; continuing");
        SkippedStep {
            step,
            reason: e.to_string(),
        }
    })
}
