//! Completion poller.
//!
//! Samples remote state until the agent has visibly produced something or a
//! deadline passes. The loop is a small state machine (`Waiting` to `Done` or
//! `TimedOut`) driven by a [`Clock`], and it only ever reads from the remote.
//!
//! The completion predicate is deliberately approximate: the task branch is
//! ahead of base by more than the seeding commits, or an open pull request
//! other than the one baton opened itself exists for the branch.

pub mod clock;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};

use crate::config::Config;
use crate::remote::{Comparison, PullRequest, RemoteRepository, RemoteRequest, RemoteResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollPhase {
    Waiting,
    Done,
    TimedOut,
}

/// What the poller is waiting on.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub branch: String,
    pub base: String,
    /// Commits baton itself put on the branch before handing it over.
    pub seed_commits: u64,
    /// The pull request baton opened; its existence is not a completion signal.
    pub own_request: Option<RemoteRequest>,
}

/// Shortest pause between samples, whatever the settings say.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub deadline: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            deadline: config.max_wait(),
            interval: config.poll_interval(),
        }
    }

    /// Override either value. The interval is capped at the deadline and
    /// never drops below [`MIN_POLL_INTERVAL`].
    pub fn with_overrides(mut self, deadline_secs: Option<u64>, interval_secs: Option<u64>) -> Self {
        if let Some(secs) = deadline_secs {
            self.deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        self.interval = self.interval.min(self.deadline).max(MIN_POLL_INTERVAL);
        self
    }
}

/// One read-only observation of the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub comparison: Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequest>,
}

impl Observation {
    /// The completion predicate.
    pub fn is_complete(&self, target: &PollTarget) -> bool {
        self.comparison.ahead_by > target.seed_commits || self.pull_request.is_some()
    }
}

/// Take one sample: the base...branch comparison and any open pull request
/// for the branch, ignoring the one baton opened.
pub fn sample(remote: &dyn RemoteRepository, target: &PollTarget) -> RemoteResult<Observation> {
    let comparison = remote.compare(&target.base, &target.branch)?;
    let own_number = target.own_request.as_ref().map(|r| r.number);
    let pull_request = remote
        .find_open_pull_request(&target.branch)?
        .filter(|pr| Some(pr.number) != own_number);
    Ok(Observation {
        comparison,
        pull_request,
    })
}

/// State of one poll loop. Recomputed from the remote on every sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollState {
    pub phase: PollPhase,
    pub elapsed_secs: u64,
    pub samples: u32,
    pub failed_samples: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ahead_by: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observation: Option<Observation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PollState {
    fn waiting() -> Self {
        Self {
            phase: PollPhase::Waiting,
            elapsed_secs: 0,
            samples: 0,
            failed_samples: 0,
            ahead_by: None,
            pull_request_open: None,
            last_observation: None,
            last_error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == PollPhase::Done
    }

    fn observe(&mut self, observation: Observation) {
        self.ahead_by = Some(observation.comparison.ahead_by);
        self.pull_request_open = Some(observation.pull_request.is_some());
        self.last_observation = Some(observation);
        self.last_error = None;
    }
}

/// Block until the completion predicate holds or `settings.deadline` passes.
///
/// Sleeps `min(interval, remaining)` before every sample and re-checks the
/// deadline after every sample, failed or not, so it returns no later than
/// one interval (or one slow sample) past the deadline. A failed sample
/// counts as "not yet done".
pub fn poll_until_done(
    remote: &dyn RemoteRepository,
    target: &PollTarget,
    settings: PollSettings,
    clock: &dyn Clock,
) -> PollState {
    let start = clock.elapsed();
    let mut state = PollState::waiting();

    info!(
        branch = %target.branch,
        deadline_secs = settings.deadline.as_secs(),
        interval_secs = settings.interval.as_secs(),
        "waiting for agent activity"
    );

    loop {
        let elapsed = clock.elapsed().saturating_sub(start);
        state.elapsed_secs = elapsed.as_secs();

        if elapsed >= settings.deadline {
            state.phase = PollPhase::TimedOut;
            info!(branch = %target.branch, samples = state.samples, "poll deadline reached");
            return state;
        }

        let remaining = settings.deadline - elapsed;
        clock.sleep(settings.interval.max(MIN_POLL_INTERVAL).min(remaining));

        state.samples += 1;
        match sample(remote, target) {
            Ok(observation) => {
                let complete = observation.is_complete(target);
                debug!(
                    ahead_by = observation.comparison.ahead_by,
                    pull_request = observation.pull_request.is_some(),
                    "poll sample"
                );
                state.observe(observation);
                if complete {
                    state.phase = PollPhase::Done;
                    state.elapsed_secs = clock.elapsed().saturating_sub(start).as_secs();
                    info!(branch = %target.branch, elapsed_secs = state.elapsed_secs, "agent activity detected");
                    return state;
                }
            }
            Err(e) => {
                state.failed_samples += 1;
                let remaining = settings
                    .deadline
                    .saturating_sub(clock.elapsed().saturating_sub(start));
                warn!(
                    error = %e,
                    remaining_secs = remaining.as_secs(),
                    "poll sample failed; treating as not done"
                );
                state.last_error = Some(e.to_string());
            }
        }
    }
}

/// Where to look manually after a timed-out wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextSteps {
    pub branch_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
    pub status_command: String,
    pub sync_command: String,
}

impl NextSteps {
    pub fn for_target(
        remote: &dyn RemoteRepository,
        web_base_url: &str,
        target: &PollTarget,
    ) -> Self {
        let slug = remote.slug();
        let mut status_command = format!(
            "baton status {} {} --base {} --seed-commits {}",
            slug, target.branch, target.base, target.seed_commits
        );
        if let Some(own) = &target.own_request {
            status_command.push_str(&format!(" --exclude-pr {}", own.number));
        }
        Self {
            branch_url: slug.branch_url(web_base_url, &target.branch),
            pull_request_url: target.own_request.as_ref().map(|r| r.url.clone()),
            status_command,
            sync_command: format!("baton sync --repo {} --base {} --merge", slug, target.base),
        }
    }
}
