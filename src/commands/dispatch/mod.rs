//! Implementation of the `baton dispatch` command.
//!
//! # Steps
//!
//! 1. Resolve the repository and the credential; without one nothing else runs
//! 2. Open `--local`, or clone into it or into the clone root
//! 3. Ensure the task branch (a generated name, or `--branch` to resume)
//! 4. Check out the task branch locally, write the brief, commit
//! 5. Publish: push, falling back to per-file uploads
//! 6. Announce; a resumed branch with an open pull request only gets the
//!    trigger, and only when it has none yet (or with `--retrigger`)
//! 7. With `--wait`, poll until the agent acts or the deadline passes
//! 8. Write `last_dispatch.json` and print the report

mod report;


pub use report::{DispatchReport, DispatchStatus};

use super::{connect, print_json, resolve_base, resolve_repo};
use crate::announce::{announce, ensure_trigger};
use crate::best_effort::{self, BestEffort, SkippedStep};
use crate::cli::DispatchArgs;
use crate::config::Config;
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, Journal};
use crate::fs::atomic_write_file;
use crate::poll::{
    Clock, NextSteps, PollPhase, PollSettings, PollTarget, SystemClock, poll_until_done,
};
use crate::provision::{ProvisionedBranch, ensure_branch};
use crate::publish::{
    ChangeSet, GitPushTransport, PendingFile, PublishOutcome, PushTransport, credentialed_url,
    publish,
};
use crate::remote::{RemoteRepository, RepoSlug};
use crate::task::Task;
use crate::working_copy::{LocalWorkingCopy, PathScope};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Generated branch names tried before giving up.
const MAX_BRANCH_NAME_ATTEMPTS: i64 = 5;

/// File in the state directory holding the most recent report.
pub const LAST_DISPATCH_FILE: &str = "last_dispatch.json";

/// Everything a dispatch run needs besides the request itself.
pub struct DispatchContext<'a> {
    pub remote: &'a dyn RemoteRepository,
    pub copy: Option<&'a LocalWorkingCopy>,
    pub primary: Option<&'a dyn PushTransport>,
    pub config: &'a Config,
    pub journal: &'a Journal,
    pub clock: &'a dyn Clock,
}

/// One dispatch, as requested on the command line.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub description: String,
    pub base: String,
    pub scope: Option<PathScope>,
    pub resume_branch: Option<String>,
    /// Post the trigger again on a resumed branch's open pull request.
    pub retrigger: bool,
    pub create_issue: bool,
    pub wait: Option<PollSettings>,
    pub created_at: DateTime<Utc>,
}

pub fn cmd_dispatch(args: DispatchArgs, config: &Config) -> Result<i32> {
    Task::validate_description(&args.task)?;
    let explicit = args.repo.as_deref().map(RepoSlug::parse).transpose()?;

    // An existing checkout is opened up front; it may be the only source of the slug.
    let existing_copy = match &args.local {
        Some(path) if path.join(".git").exists() => {
            Some(LocalWorkingCopy::open(path, &config.remote)?)
        }
        _ => None,
    };
    let slug = match explicit {
        Some(slug) => slug,
        None => resolve_repo(None, existing_copy.as_ref())?,
    };

    let (client, token) = connect(config, &slug)?;

    let copy = match (existing_copy, &args.local, args.clone) {
        (Some(copy), _, _) => Some(copy),
        (None, Some(path), _) => Some(clone_into(&slug, path.clone(), config)?),
        (None, None, true) => {
            let path = config.clone_root().join(&slug.name);
            Some(clone_into(&slug, path, config)?)
        }
        (None, None, false) => None,
    };

    let transport = match &copy {
        Some(copy) => {
            let push_url = credentialed_url(&slug.clone_url(&config.web_base_url), &token)?;
            Some(GitPushTransport::new(copy, Some(push_url), config.push_timeout()))
        }
        None => None,
    };

    let request = DispatchRequest {
        description: args.task,
        base: resolve_base(args.base.as_deref(), config),
        scope: args.scope.as_deref().and_then(PathScope::new),
        resume_branch: args.branch,
        retrigger: args.retrigger,
        create_issue: config.create_advisory_issue && !args.no_issue,
        wait: args.wait.then(|| {
            PollSettings::from_config(config).with_overrides(args.max_wait_secs, args.interval_secs)
        }),
        created_at: Utc::now(),
    };

    let state_dir = config.state_dir();
    let journal = Journal::in_dir(&state_dir);
    let clock = SystemClock::new();
    let ctx = DispatchContext {
        remote: &client,
        copy: copy.as_ref(),
        primary: transport.as_ref().map(|t| t as &dyn PushTransport),
        config,
        journal: &journal,
        clock: &clock,
    };

    let mut report = run_dispatch(&ctx, &request)?;

    let report_path = state_dir.join(LAST_DISPATCH_FILE);
    if let Err(step) = best_effort::attempt(BestEffort::ReportWrite, write_report(&report_path, &report)) {
        report.skipped.push(step);
    }

    print_json(&report)?;
    Ok(report.exit_code())
}

fn clone_into(slug: &RepoSlug, path: PathBuf, config: &Config) -> Result<LocalWorkingCopy> {
    LocalWorkingCopy::clone_or_open(&slug.clone_url(&config.web_base_url), path, &config.remote)
}

fn write_report(path: &Path, report: &DispatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BatonError::UserError(format!("failed to serialize report: {}", e)))?;
    atomic_write_file(path, &format!("{}\n", json))
}

/// Run one dispatch against `ctx.remote`.
pub fn run_dispatch(ctx: &DispatchContext<'_>, request: &DispatchRequest) -> Result<DispatchReport> {
    Task::validate_description(&request.description)?;
    let mut skipped: Vec<SkippedStep> = Vec::new();

    let (branch, provisioned) = provision_task_branch(ctx, request)?;
    let task = Task::new(
        &request.description,
        ctx.remote.slug().clone(),
        &request.base,
        branch,
        request.scope.clone(),
        ctx.copy.map(|c| c.path().to_path_buf()),
        request.created_at,
    )?;

    skipped.extend(ctx.journal.record(
        &Event::new(EventAction::Dispatch)
            .with_task(task.id())
            .with_details(json!({
                "description": task.description,
                "scope": task.scope,
                "local_path": task.local_path,
            })),
    ));
    skipped.extend(ctx.journal.record(
        &Event::new(EventAction::Provision)
            .with_task(task.id())
            .with_details(json!({
                "repo": task.repo,
                "base": task.base,
                "sha": provisioned.branch.sha,
                "created": provisioned.created,
            })),
    ));

    let existing = if provisioned.created {
        None
    } else {
        ctx.remote
            .find_open_pull_request(&task.branch)
            .map_err(|e| BatonError::remote("checking for an open pull request", e))?
    };

    let outcome = match ctx.copy {
        Some(copy) => publish_from_copy(ctx, copy, &task, provisioned.created)?,
        None => publish_brief(ctx, &task),
    };
    skipped.extend(ctx.journal.record(
        &Event::new(EventAction::Publish)
            .with_task(task.id())
            .with_details(json!({
                "transport": outcome.transport,
                "attempted": outcome.attempted.len(),
                "succeeded": outcome.succeeded.len(),
                "failed": outcome.failed,
            })),
    ));

    let mut retriggered = false;
    let (announcement, pull_request) = match &existing {
        Some(pr) => {
            info!(number = pr.number, "open pull request already exists; not announcing again");
            retriggered = ensure_trigger(
                ctx.remote,
                &task,
                pr.number,
                &ctx.config.agent_handle,
                request.retrigger,
            )?;
            (None, Some(pr.as_request()))
        }
        None => {
            let config = Config {
                create_advisory_issue: request.create_issue,
                ..ctx.config.clone()
            };
            let announcement = announce(ctx.remote, &task, &config)?;
            let pull_request = Some(announcement.pull_request.clone());
            (Some(announcement), pull_request)
        }
    };
    let announced = announcement.is_some();
    let advisory_issue = announcement.as_ref().and_then(|a| a.advisory_issue.clone());
    if let Some(announcement) = announcement {
        skipped.extend(announcement.skipped);
    }
    skipped.extend(ctx.journal.record(
        &Event::new(EventAction::Announce)
            .with_task(task.id())
            .with_details(json!({
                "announced": announced,
                "retriggered": retriggered,
                "pull_request": pull_request,
                "advisory_issue": advisory_issue,
            })),
    ));

    let seed_commits = seed_baseline(ctx.remote, &task, &outcome);

    let target = PollTarget {
        branch: task.branch.clone(),
        base: task.base.clone(),
        seed_commits,
        own_request: pull_request.clone(),
    };

    let poll = request
        .wait
        .map(|settings| poll_until_done(ctx.remote, &target, settings, ctx.clock));

    let next_steps = match &poll {
        Some(state) => {
            let action = if state.is_done() {
                EventAction::PollDone
            } else {
                EventAction::PollTimeout
            };
            skipped.extend(ctx.journal.record(
                &Event::new(action).with_task(task.id()).with_details(json!({
                    "elapsed_secs": state.elapsed_secs,
                    "samples": state.samples,
                    "ahead_by": state.ahead_by,
                })),
            ));
            (state.phase == PollPhase::TimedOut)
                .then(|| NextSteps::for_target(ctx.remote, &ctx.config.web_base_url, &target))
        }
        None => None,
    };

    Ok(DispatchReport {
        status: DispatchReport::status_for(poll.as_ref()),
        repo: task.repo.clone(),
        base: task.base.clone(),
        branch: task.branch.clone(),
        resumed: !provisioned.created,
        branch_sha: provisioned.branch.sha,
        task: task.description.clone(),
        publish: outcome,
        announced,
        retriggered,
        pull_request,
        advisory_issue,
        seed_commits,
        poll,
        next_steps,
        skipped,
    })
}

/// Ensure the requested branch, or find a free generated one.
///
/// A generated name that already exists belongs to another task and is never
/// adopted; the suffix moves forward instead.
fn provision_task_branch(
    ctx: &DispatchContext<'_>,
    request: &DispatchRequest,
) -> Result<(String, ProvisionedBranch)> {
    if let Some(branch) = &request.resume_branch {
        let provisioned = ensure_branch(ctx.remote, &request.base, branch)?;
        return Ok((branch.clone(), provisioned));
    }

    for offset in 0..MAX_BRANCH_NAME_ATTEMPTS {
        let branch = Task::branch_name(&ctx.config.branch_prefix, request.created_at, offset);
        let provisioned = ensure_branch(ctx.remote, &request.base, &branch)?;
        if provisioned.created {
            return Ok((branch, provisioned));
        }
        warn!(branch = %branch, "generated branch name is taken; trying the next one");
    }

    Err(BatonError::UserError(format!(
        "no free task branch name after {} attempts with prefix '{}'",
        MAX_BRANCH_NAME_ATTEMPTS, ctx.config.branch_prefix
    )))
}

/// Put the working copy on the task branch, commit the brief and any local
/// changes, then publish everything committed since the branch's start point.
fn publish_from_copy(
    ctx: &DispatchContext<'_>,
    copy: &LocalWorkingCopy,
    task: &Task,
    created: bool,
) -> Result<PublishOutcome> {
    copy.fetch()?;

    let start_point = if !created && copy.has_tracking_branch(&task.branch) {
        copy.tracking_ref(&task.branch)
    } else {
        copy.tracking_ref(&task.base)
    };
    let start_sha = copy.checkout_reset(&task.branch, &start_point)?;
    info!(branch = %task.branch, start = %start_point, "checked out task branch");

    if ctx.config.write_task_brief {
        let brief_path = task.brief_path(&ctx.config.brief_dir, &ctx.config.brief_file_name);
        copy.write_file(&brief_path, &task.render_brief())?;
    }

    let message = task.seed_commit_message(&ctx.config.title_marker);
    copy.commit_all(&message, task.scope.as_ref())?;

    let left_behind = copy.status_porcelain()?;
    if !left_behind.is_empty() {
        warn!(
            count = left_behind.len(),
            "uncommitted changes outside the task scope stay local"
        );
    }

    let changes = ChangeSet::from_working_copy(copy, &start_sha, task.scope.as_ref())?;
    Ok(publish(ctx.remote, ctx.primary, &task.branch, &changes, &message))
}

/// Without a working copy the brief is the only content, uploaded directly.
fn publish_brief(ctx: &DispatchContext<'_>, task: &Task) -> PublishOutcome {
    let changes = if ctx.config.write_task_brief {
        let brief_path = task.brief_path(&ctx.config.brief_dir, &ctx.config.brief_file_name);
        ChangeSet::new(vec![PendingFile::in_memory(brief_path, task.render_brief())])
    } else {
        ChangeSet::default()
    };
    let message = task.seed_commit_message(&ctx.config.title_marker);
    publish(ctx.remote, None, &task.branch, &changes, &message)
}

/// Commits ahead of base right after publishing; agent activity is anything beyond this.
fn seed_baseline(remote: &dyn RemoteRepository, task: &Task, outcome: &PublishOutcome) -> u64 {
    match remote.compare(&task.base, &task.branch) {
        Ok(comparison) => comparison.ahead_by,
        Err(e) => {
            let estimate = u64::from(!outcome.succeeded.is_empty());
            warn!(error = %e, estimate, "could not read seed commit count; using estimate");
            estimate
        }
    }
}
