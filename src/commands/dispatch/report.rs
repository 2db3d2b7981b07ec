//! The JSON report printed by `baton dispatch`.

use crate::best_effort::SkippedStep;
use crate::exit_codes;
use crate::poll::{NextSteps, PollPhase, PollState};
use crate::publish::PublishOutcome;
use crate::remote::{RemoteRequest, RepoSlug};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Announced; not waiting.
    Sent,
    /// Waited and saw agent activity.
    Done,
    /// Waited until the deadline without seeing agent activity.
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub status: DispatchStatus,
    pub repo: RepoSlug,
    pub base: String,
    pub branch: String,
    /// The branch already existed and was picked up again.
    pub resumed: bool,
    pub branch_sha: String,
    pub task: String,
    pub publish: PublishOutcome,
    /// `false` when an open pull request already existed and no new trigger was posted.
    pub announced: bool,
    /// The trigger was (re)posted on an already-open pull request.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retriggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<RemoteRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_issue: Option<RemoteRequest>,
    pub seed_commits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<NextSteps>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedStep>,
}

impl DispatchReport {
    pub fn status_for(poll: Option<&PollState>) -> DispatchStatus {
        match poll.map(|p| p.phase) {
            None | Some(PollPhase::Waiting) => DispatchStatus::Sent,
            Some(PollPhase::Done) => DispatchStatus::Done,
            Some(PollPhase::TimedOut) => DispatchStatus::TimedOut,
        }
    }

    /// A partial publish takes precedence over a timeout.
    pub fn exit_code(&self) -> i32 {
        if self.publish.is_partial() {
            exit_codes::PARTIAL
        } else if self.status == DispatchStatus::TimedOut {
            exit_codes::TIMED_OUT
        } else {
            exit_codes::SUCCESS
        }
    }
}
