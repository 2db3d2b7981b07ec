//! Implementation of the `baton status` and `baton result` commands.
//!
//! Both are read-only: they sample the remote once and print what they saw.
//! `status` answers "has the agent acted yet?" with the same predicate the
//! dispatch wait loop uses; `result` shows what a task branch changed.

use super::{connect, print_json, resolve_base};
use crate::cli::{ResultArgs, StatusArgs};
use crate::config::Config;
use crate::error::{BatonError, Result};
use crate::exit_codes;
use crate::poll::{Observation, PollTarget, sample};
use crate::remote::{RemoteRepository, RemoteRequest, RepoSlug, RequestKind};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusReport {
    repo: RepoSlug,
    branch: String,
    base: String,
    seed_commits: u64,
    /// Completion predicate over this sample.
    complete: bool,
    observation: Observation,
}

#[derive(Debug, Serialize)]
struct ResultReport {
    repo: RepoSlug,
    branch: String,
    base: String,
    branch_url: String,
    status: String,
    ahead_by: u64,
    behind_by: u64,
    total_commits: u64,
    files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request: Option<RemoteRequest>,
}

pub fn cmd_status(args: StatusArgs, config: &Config) -> Result<i32> {
    let slug = RepoSlug::parse(&args.repo)?;
    let base = resolve_base(args.base.as_deref(), config);
    let (client, _token) = connect(config, &slug)?;

    let own_request = args.exclude_pr.map(|number| RemoteRequest {
        kind: RequestKind::PullRequest,
        number,
        url: format!("{}/pull/{}", slug.web_url(&config.web_base_url), number),
        branch: Some(args.branch.clone()),
    });
    let target = PollTarget {
        branch: args.branch,
        base,
        seed_commits: args.seed_commits,
        own_request,
    };

    print_json(&status_report(&client, &target)?)?;
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_result(args: ResultArgs, config: &Config) -> Result<i32> {
    let slug = RepoSlug::parse(&args.repo)?;
    let base = resolve_base(args.base.as_deref(), config);
    let (client, _token) = connect(config, &slug)?;

    print_json(&result_report(&client, &config.web_base_url, &args.branch, &base)?)?;
    Ok(exit_codes::SUCCESS)
}

fn status_report(remote: &dyn RemoteRepository, target: &PollTarget) -> Result<StatusReport> {
    let observation = sample(remote, target).map_err(|e| {
        BatonError::remote(format!("sampling '{}' against '{}'", target.branch, target.base), e)
    })?;
    Ok(StatusReport {
        repo: remote.slug().clone(),
        branch: target.branch.clone(),
        base: target.base.clone(),
        seed_commits: target.seed_commits,
        complete: observation.is_complete(target),
        observation,
    })
}

fn result_report(
    remote: &dyn RemoteRepository,
    web_base_url: &str,
    branch: &str,
    base: &str,
) -> Result<ResultReport> {
    let comparison = remote
        .compare(base, branch)
        .map_err(|e| BatonError::remote(format!("comparing '{}' with '{}'", branch, base), e))?;
    let pull_request = remote
        .find_open_pull_request(branch)
        .map_err(|e| BatonError::remote("looking up the task pull request", e))?;

    Ok(ResultReport {
        repo: remote.slug().clone(),
        branch: branch.to_string(),
        base: base.to_string(),
        branch_url: remote.slug().branch_url(web_base_url, branch),
        status: comparison.status,
        ahead_by: comparison.ahead_by,
        behind_by: comparison.behind_by,
        total_commits: comparison.total_commits,
        files: comparison.files,
        pull_request: pull_request.map(|pr| pr.as_request()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRemote, http_error};

    fn target(seed_commits: u64, own: Option<u64>) -> PollTarget {
        PollTarget {
            branch: "baton/1".to_string(),
            base: "main".to_string(),
            seed_commits,
            own_request: own.map(|number| RemoteRequest {
                kind: RequestKind::PullRequest,
                number,
                url: format!("https://github.com/acme/widgets/pull/{}", number),
                branch: Some("baton/1".to_string()),
            }),
        }
    }

    fn remote() -> FakeRemote {
        let remote = FakeRemote::with_main("aaa111");
        remote.set_branch("baton/1", "bbb222");
        remote
    }

    #[test]
    fn seed_commit_alone_is_not_complete() {
        let remote = remote();
        remote.set_ahead("baton/1", 1);

        let report = status_report(&remote, &target(1, None)).unwrap();

        assert!(!report.complete);
        assert_eq!(report.observation.comparison.ahead_by, 1);
    }

    #[test]
    fn own_pull_request_is_excluded() {
        let remote = remote();
        let own = remote.open_pull("baton/1", "main", "[baton] task", &[]);

        let report = status_report(&remote, &target(1, Some(own))).unwrap();

        assert!(!report.complete);
        assert!(report.observation.pull_request.is_none());

        let report = status_report(&remote, &target(1, None)).unwrap();
        assert!(report.complete);
    }

    #[test]
    fn commits_beyond_seed_are_complete() {
        let remote = remote();
        remote.set_ahead("baton/1", 3);

        let report = status_report(&remote, &target(1, None)).unwrap();

        assert!(report.complete);
    }

    #[test]
    fn sample_failure_is_remote_error() {
        let remote = remote();
        remote.fail("compare", 1, http_error(500, "Server Error"));

        let err = status_report(&remote, &target(1, None)).unwrap_err();

        assert!(matches!(err, BatonError::RemoteError { .. }));
    }

    #[test]
    fn result_lists_changed_files_and_pull_request() {
        let remote = remote();
        remote.set_ahead("baton/1", 2);
        remote.add_file("baton/1", "src/log.rs", b"pub fn log() {}\n");
        let number = remote.open_pull("baton/1", "main", "[baton] add logging", &[]);

        let report = result_report(&remote, "https://github.com", "baton/1", "main").unwrap();

        assert_eq!(report.ahead_by, 2);
        assert_eq!(report.files, vec!["src/log.rs".to_string()]);
        assert_eq!(report.pull_request.map(|r| r.number), Some(number));
        assert_eq!(report.branch_url, "https://github.com/acme/widgets/tree/baton/1");
    }

    #[test]
    fn result_for_missing_branch_is_error() {
        let remote = FakeRemote::with_main("aaa111");

        assert!(result_report(&remote, "https://github.com", "baton/404", "main").is_err());
    }
}
