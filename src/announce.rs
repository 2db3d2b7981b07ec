//! Task announcement.
//!
//! Opens the pull request the remote agent works in, posts the trigger
//! comment on it, then labels it and opens an advisory tracking issue. The
//! pull request and trigger are required; labels and the issue are
//! best-effort steps.

use crate::best_effort::{self, BestEffort, SkippedStep};
use crate::config::Config;
use crate::error::{BatonError, Result};
use crate::remote::{NewIssue, NewPullRequest, RemoteRepository, RemoteRequest};
use crate::task::Task;
use serde::Serialize;
use tracing::info;

/// What [`announce`] created.
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub pull_request: RemoteRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_issue: Option<RemoteRequest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedStep>,
}

pub fn pull_request_body(task: &Task) -> String {
    let mut body = String::from("## Task\n\n");
    body.push_str(&task.description);
    body.push_str("\n\n");
    body.push_str(&format!("Branch: `{}` -> Base: `{}`\n", task.branch, task.base));
    if let Some(scope) = &task.scope {
        body.push_str(&format!("Scope: `{}`\n", scope.as_str()));
    }
    body.push_str("\n### Expected\n");
    body.push_str("- Implement the task directly in this pull request by pushing commits\n");
    body.push_str("- Keep CI green\n");
    body
}

/// The trigger directive: the agent handle followed by the task verbatim.
pub fn trigger_comment(task: &Task, agent_handle: &str) -> String {
    format!(
        "{} {}\n\nPlease commit your changes to this pull request and keep CI green.",
        agent_handle, task.description
    )
}

fn issue_body(task: &Task, pull_request: &RemoteRequest) -> String {
    format!(
        "Tracking issue for a dispatched task. Work happens in {}.\n\n\
         Task: {}\n\n\
         Branch: `{}` -> Base: `{}`\n",
        pull_request.url, task.description, task.branch, task.base
    )
}

/// Whether `body` is a trigger directive for `agent_handle`.
pub fn is_trigger_comment(body: &str, agent_handle: &str) -> bool {
    let handle = agent_handle.trim();
    !handle.is_empty() && body.trim_start().starts_with(handle)
}

/// Post the trigger comment on pull request `number`.
pub fn post_trigger(
    remote: &dyn RemoteRepository,
    task: &Task,
    number: u64,
    agent_handle: &str,
) -> Result<()> {
    remote
        .post_comment(number, &trigger_comment(task, agent_handle))
        .map_err(|e| {
            BatonError::remote(
                format!(
                    "posting trigger comment on #{} (retry with --branch {})",
                    number, task.branch
                ),
                e,
            )
        })?;
    info!(number, handle = %agent_handle, "posted trigger");
    Ok(())
}

/// Make sure an already-open pull request carries a trigger.
///
/// A pull request left behind by a run whose trigger failed has none; the
/// trigger is posted then, or whenever `force` is set. Returns whether a
/// trigger was posted.
pub fn ensure_trigger(
    remote: &dyn RemoteRepository,
    task: &Task,
    number: u64,
    agent_handle: &str,
    force: bool,
) -> Result<bool> {
    if !force {
        let comments = remote
            .list_comments(number)
            .map_err(|e| BatonError::remote(format!("reading comments on #{}", number), e))?;
        if comments.iter().any(|body| is_trigger_comment(body, agent_handle)) {
            return Ok(false);
        }
        info!(number, "open pull request has no trigger yet");
    }
    post_trigger(remote, task, number, agent_handle)?;
    Ok(true)
}

/// Announce `task` on the remote.
///
/// Callers must check for an existing open pull request on the branch first;
/// announcing twice posts a second trigger.
pub fn announce(remote: &dyn RemoteRepository, task: &Task, config: &Config) -> Result<Announcement> {
    let title = task.title(&config.title_marker);

    let pull_request = remote
        .create_pull_request(&NewPullRequest {
            title: title.clone(),
            head: task.branch.clone(),
            base: task.base.clone(),
            body: pull_request_body(task),
            draft: false,
        })
        .map_err(|e| BatonError::remote("opening pull request", e))?;
    info!(number = pull_request.number, url = %pull_request.url, "opened pull request");

    post_trigger(remote, task, pull_request.number, &config.agent_handle)?;

    let mut skipped = Vec::new();
    let labels = config.request_labels();

    if !labels.is_empty()
        && let Err(step) = best_effort::attempt(
            BestEffort::RequestLabels,
            remote.add_labels(pull_request.number, &labels),
        )
    {
        skipped.push(step);
    }

    let mut advisory_issue = None;
    if config.create_advisory_issue {
        let issue = NewIssue {
            title,
            body: issue_body(task, &pull_request),
            labels,
        };
        match best_effort::attempt(BestEffort::AdvisoryIssue, remote.create_issue(&issue)) {
            Ok(created) => {
                info!(number = created.number, "opened advisory issue");
                advisory_issue = Some(created);
            }
            Err(step) => skipped.push(step),
        }
    }

    Ok(Announcement {
        pull_request,
        advisory_issue,
        skipped,
    })
}
