//! Remote repository client.
//!
//! A stateless request/response boundary around the hosting platform's HTTP
//! API. Components depend on the [`RemoteRepository`] trait so tests can
//! substitute an in-memory fake; [`GitHubClient`] is the production
//! implementation.
//!
//! Implementations normalize responses into the types in [`types`] and report
//! failures as [`RemoteError`]; they never decide what a failure means.

mod error;
mod github;
mod slug;
pub mod types;

pub use error::RemoteError;
pub use github::GitHubClient;
pub use slug::RepoSlug;
pub use types::{
    BranchRef, Comparison, ContentMeta, ContentUpdate, MergeOutcome, NewIssue, NewPullRequest,
    PullRequest, RemoteRequest, RequestKind,
};

use crate::config::MergeStrategy;

/// Result of a remote call.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Operations the orchestration engine needs from the hosting platform.
pub trait RemoteRepository {
    /// The repository this client talks to.
    fn slug(&self) -> &RepoSlug;

    /// Read `refs/heads/<branch>`.
    fn get_branch_ref(&self, branch: &str) -> RemoteResult<BranchRef>;

    /// Create `refs/heads/<branch>` at `sha`. Fails with 422 if it exists.
    fn create_branch_ref(&self, branch: &str, sha: &str) -> RemoteResult<BranchRef>;

    /// Read a file's metadata on `branch`; `Ok(None)` when it does not exist.
    fn get_content(&self, branch: &str, path: &str) -> RemoteResult<Option<ContentMeta>>;

    /// Create or replace a single file on a branch.
    fn put_content(&self, update: &ContentUpdate<'_>) -> RemoteResult<()>;

    fn create_pull_request(&self, request: &NewPullRequest) -> RemoteResult<RemoteRequest>;

    fn create_issue(&self, issue: &NewIssue) -> RemoteResult<RemoteRequest>;

    /// Open pull requests targeting `base`.
    fn list_open_pull_requests(&self, base: &str) -> RemoteResult<Vec<PullRequest>>;

    /// The open pull request whose head is `branch`, if any.
    fn find_open_pull_request(&self, branch: &str) -> RemoteResult<Option<PullRequest>>;

    /// Add labels to an issue or pull request.
    fn add_labels(&self, number: u64, labels: &[String]) -> RemoteResult<()>;

    /// Comment on an issue or pull request.
    fn post_comment(&self, number: u64, body: &str) -> RemoteResult<()>;

    /// Bodies of every comment on an issue or pull request, oldest first.
    fn list_comments(&self, number: u64) -> RemoteResult<Vec<String>>;

    /// Compare `base...head`.
    fn compare(&self, base: &str, head: &str) -> RemoteResult<Comparison>;

    fn merge_pull_request(
        &self,
        number: u64,
        strategy: MergeStrategy,
    ) -> RemoteResult<MergeOutcome>;
}
