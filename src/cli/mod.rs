//! CLI argument parsing for baton.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Baton: hand a coding task to a remote agent through GitHub, then bring
/// its work back.
///
/// `dispatch` creates a task branch, publishes local changes to it, opens a
/// pull request and posts the trigger for the agent. `sync` merges finished
/// task pull requests and fast-forwards a local checkout.
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the YAML config file (default: $BATON_CONFIG, then ~/.baton/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for baton.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch a task to the remote agent.
    ///
    /// Ensures the task branch, publishes local changes (push, falling back
    /// to per-file uploads), opens the pull request and posts the trigger.
    Dispatch(DispatchArgs),

    /// Merge finished task pull requests and update a local checkout.
    Sync(SyncArgs),

    /// Sample a task branch once and report whether the agent has acted.
    Status(StatusArgs),

    /// Show what a task branch changed relative to its base.
    Result(ResultArgs),
}

/// Arguments for the `dispatch` command.
#[derive(Parser, Debug)]
pub struct DispatchArgs {
    /// Repository as owner/name. Derived from the local checkout's remote when omitted.
    #[arg(long)]
    pub repo: Option<String>,

    /// Task description handed to the agent verbatim.
    #[arg(long)]
    pub task: String,

    /// Base branch (default from config).
    #[arg(long)]
    pub base: Option<String>,

    /// Restrict published changes (and the task brief) to this subtree.
    #[arg(long)]
    pub scope: Option<String>,

    /// Local working copy to publish from.
    #[arg(long, conflicts_with = "clone")]
    pub local: Option<PathBuf>,

    /// Clone (or reuse) a working copy under the configured clone root.
    #[arg(long, action = ArgAction::SetTrue)]
    pub clone: bool,

    /// Resume an existing task branch instead of creating a new one.
    #[arg(long)]
    pub branch: Option<String>,

    /// Post the trigger again on the resumed branch's open pull request.
    #[arg(long, action = ArgAction::SetTrue, requires = "branch")]
    pub retrigger: bool,

    /// Block until the agent acts or the deadline passes.
    #[arg(long, action = ArgAction::SetTrue)]
    pub wait: bool,

    /// Override the poll deadline in seconds.
    #[arg(long, requires = "wait", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_wait_secs: Option<u64>,

    /// Override the poll interval in seconds.
    #[arg(long, requires = "wait", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: Option<u64>,

    /// Do not open the advisory tracking issue.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_issue: bool,
}

/// Arguments for the `sync` command.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Repository as owner/name. Derived from --local's remote when omitted.
    #[arg(long)]
    pub repo: Option<String>,

    /// Base branch (default from config).
    #[arg(long)]
    pub base: Option<String>,

    /// Merge managed pull requests.
    #[arg(long, action = ArgAction::SetTrue)]
    pub merge: bool,

    /// Fast-forward the local working copy afterwards.
    #[arg(long, action = ArgAction::SetTrue)]
    pub pull: bool,

    /// Local working copy to update.
    #[arg(long)]
    pub local: Option<PathBuf>,

    /// Merge strategy override: merge, squash or rebase.
    #[arg(long)]
    pub strategy: Option<String>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Repository as owner/name.
    pub repo: String,

    /// Task branch.
    pub branch: String,

    /// Base branch (default from config).
    #[arg(long)]
    pub base: Option<String>,

    /// Commits baton put on the branch itself; not counted as agent activity.
    #[arg(long, default_value_t = 1)]
    pub seed_commits: u64,

    /// Pull request number to ignore (the one baton opened).
    #[arg(long)]
    pub exclude_pr: Option<u64>,
}

/// Arguments for the `result` command.
#[derive(Parser, Debug)]
pub struct ResultArgs {
    /// Repository as owner/name.
    pub repo: String,

    /// Task branch.
    pub branch: String,

    /// Base branch (default from config).
    #[arg(long)]
    pub base: Option<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
