//! Command implementations for baton.
//!
//! [`dispatch`] routes a parsed CLI command to its handler. Handlers return
//! the process exit code for outcomes that are not errors (a timed-out wait,
//! a partial publish or sync); aborting failures come back as `Err`.

mod dispatch;
mod status;
mod sync;

use crate::cli::Command;
use crate::config::Config;
use crate::credentials;
use crate::error::{BatonError, Result};
use crate::remote::{GitHubClient, RepoSlug};
use crate::working_copy::LocalWorkingCopy;
use secrecy::SecretString;
use serde::Serialize;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &Config) -> Result<i32> {
    match command {
        Command::Dispatch(args) => dispatch::cmd_dispatch(args, config),
        Command::Sync(args) => sync::cmd_sync(args, config),
        Command::Status(args) => status::cmd_status(args, config),
        Command::Result(args) => status::cmd_result(args, config),
    }
}

/// Resolve the credential and build a client for `slug`.
///
/// A missing credential is fatal here, before any transport is attempted.
fn connect(config: &Config, slug: &RepoSlug) -> Result<(GitHubClient, SecretString)> {
    let token = credentials::require(&config.credentials)?;
    let client = GitHubClient::new(slug.clone(), token.clone(), config)
        .map_err(|e| BatonError::ConfigError(e.to_string()))?;
    Ok((client, token))
}

/// Use `--repo` when given, otherwise derive it from the working copy's remote.
fn resolve_repo(explicit: Option<&str>, copy: Option<&LocalWorkingCopy>) -> Result<RepoSlug> {
    match (explicit, copy) {
        (Some(raw), _) => RepoSlug::parse(raw),
        (None, Some(copy)) => RepoSlug::from_remote_url(&copy.remote_url()?),
        (None, None) => Err(BatonError::UserError(
            "no repository given: pass --repo owner/name or --local <path>".to_string(),
        )),
    }
}

fn resolve_base(explicit: Option<&str>, config: &Config) -> String {
    explicit
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(&config.default_base_branch)
        .to_string()
}

/// Print a report as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| BatonError::UserError(format!("failed to serialize report: {}", e)))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_repo_with_bare_origin, git};

    #[test]
    fn resolve_repo_prefers_explicit() {
        let slug = resolve_repo(Some("acme/widgets"), None).unwrap();
        assert_eq!(slug.to_string(), "acme/widgets");
    }

    #[test]
    fn resolve_repo_from_working_copy_remote() {
        let repos = create_repo_with_bare_origin();
        git(
            repos.work.path(),
            &["remote", "set-url", "origin", "git@github.com:acme/widgets.git"],
        );
        let copy = LocalWorkingCopy::open(repos.work.path(), "origin").unwrap();

        let slug = resolve_repo(None, Some(&copy)).unwrap();

        assert_eq!(slug.to_string(), "acme/widgets");
    }

    #[test]
    fn resolve_repo_without_any_source_is_user_error() {
        let err = resolve_repo(None, None).unwrap_err();
        assert!(matches!(err, BatonError::UserError(_)));
    }

    #[test]
    fn resolve_base_falls_back_to_config() {
        let config = Config::default();
        assert_eq!(resolve_base(None, &config), "main");
        assert_eq!(resolve_base(Some("  "), &config), "main");
        assert_eq!(resolve_base(Some("develop"), &config), "develop");
    }
}
