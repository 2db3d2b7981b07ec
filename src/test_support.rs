//! Fixtures shared by unit tests: throwaway git repositories and in-memory
//! fakes for the remote, the clock and the push transport.

use crate::config::MergeStrategy;
use crate::poll::Clock;
use crate::publish::{PushAttempt, PushTransport};
use crate::remote::{
    BranchRef, Comparison, ContentMeta, ContentUpdate, MergeOutcome, NewIssue, NewPullRequest,
    PullRequest, RemoteError, RemoteRepository, RemoteRequest, RemoteResult, RepoSlug,
    RequestKind,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::process::Command;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Git repositories
// ---------------------------------------------------------------------------

/// A repository on `main` with a single commit.
pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    // Deterministic default branch name across environments.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

/// A working copy plus the bare repository it pushes to as `origin`.
pub(crate) struct RepoWithOrigin {
    pub work: TempDir,
    pub origin: TempDir,
}

pub(crate) fn create_repo_with_bare_origin() -> RepoWithOrigin {
    let work = create_test_repo();
    let origin = TempDir::new().unwrap();

    git(origin.path(), &["init", "--bare"]);
    git(origin.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let origin_path = origin.path().to_string_lossy().to_string();
    git(work.path(), &["remote", "add", "origin", &origin_path]);
    git(work.path(), &["push", "origin", "main"]);
    git(work.path(), &["fetch", "origin"]);

    RepoWithOrigin { work, origin }
}

/// Commit a file to `branch` of a bare repository from a scratch clone,
/// simulating another actor moving the remote.
pub(crate) fn commit_to_origin(origin: &Path, branch: &str, file: &str, content: &str) {
    let scratch = TempDir::new().unwrap();
    let origin_path = origin.to_string_lossy().to_string();
    let target = scratch.path().join("clone");
    let target_str = target.to_string_lossy().to_string();

    git(scratch.path(), &["clone", "--branch", branch, &origin_path, &target_str]);
    git(&target, &["config", "user.email", "agent@example.com"]);
    git(&target, &["config", "user.name", "Remote Agent"]);
    std::fs::write(target.join(file), content).unwrap();
    git(&target, &["add", "."]);
    git(&target, &["commit", "-m", &format!("update {}", file)]);
    git(&target, &["push", "origin", branch]);
}

/// Run git, panicking on failure. Returns trimmed stdout.
pub(crate) fn git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ---------------------------------------------------------------------------
// FakeClock
// ---------------------------------------------------------------------------

/// Manually advanced clock. `sleep` advances time instantly.
#[derive(Debug, Default)]
pub(crate) struct FakeClock {
    now: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

// ---------------------------------------------------------------------------
// ScriptedPush
// ---------------------------------------------------------------------------

/// Push transport that returns a fixed attempt and counts calls.
pub(crate) struct ScriptedPush {
    attempt: PushAttempt,
    calls: Cell<usize>,
}

impl ScriptedPush {
    pub(crate) fn new(attempt: PushAttempt) -> Self {
        Self {
            attempt,
            calls: Cell::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl PushTransport for ScriptedPush {
    fn push(&self, _branch: &str) -> PushAttempt {
        self.calls.set(self.calls.get() + 1);
        self.attempt.clone()
    }
}

// ---------------------------------------------------------------------------
// FakeRemote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct StoredFile {
    pub content: Vec<u8>,
    pub sha: String,
}

#[derive(Default)]
struct FakeState {
    branches: BTreeMap<String, String>,
    files: BTreeMap<(String, String), StoredFile>,
    ahead: BTreeMap<String, u64>,
    pulls: Vec<PullRequest>,
    /// Pull requests that appear once `find_open_pull_request` has been called this many times.
    pending_pulls: Vec<(usize, PullRequest)>,
    issues: Vec<NewIssue>,
    comments: Vec<(u64, String)>,
    labels: BTreeMap<u64, Vec<String>>,
    merged: Vec<(u64, MergeStrategy)>,
    merge_failures: BTreeMap<u64, RemoteError>,
    put_failures: BTreeMap<String, RemoteError>,
    failures: BTreeMap<&'static str, VecDeque<RemoteError>>,
    calls: BTreeMap<&'static str, usize>,
    next_number: u64,
    next_blob: u64,
}

/// In-memory [`RemoteRepository`] with call counters and scripted failures.
pub(crate) struct FakeRemote {
    slug: RepoSlug,
    state: RefCell<FakeState>,
    latency: RefCell<Option<(Rc<FakeClock>, Duration)>>,
}

impl FakeRemote {
    pub(crate) fn new(slug: &str) -> Self {
        Self {
            slug: RepoSlug::parse(slug).unwrap(),
            state: RefCell::new(FakeState {
                next_number: 1,
                next_blob: 1,
                ..FakeState::default()
            }),
            latency: RefCell::new(None),
        }
    }

    /// A remote with `main` at commit `sha`.
    pub(crate) fn with_main(sha: &str) -> Self {
        let remote = Self::new("acme/widgets");
        remote.set_branch("main", sha);
        remote
    }

    pub(crate) fn set_branch(&self, name: &str, sha: &str) {
        self.state
            .borrow_mut()
            .branches
            .insert(name.to_string(), sha.to_string());
    }

    pub(crate) fn branch_sha(&self, name: &str) -> Option<String> {
        self.state.borrow().branches.get(name).cloned()
    }

    pub(crate) fn branch_count(&self) -> usize {
        self.state.borrow().branches.len()
    }

    pub(crate) fn set_ahead(&self, branch: &str, ahead_by: u64) {
        self.state
            .borrow_mut()
            .ahead
            .insert(branch.to_string(), ahead_by);
    }

    pub(crate) fn add_file(&self, branch: &str, path: &str, content: &[u8]) {
        let mut state = self.state.borrow_mut();
        let sha = format!("blob-{}", state.next_blob);
        state.next_blob += 1;
        state.files.insert(
            (branch.to_string(), path.to_string()),
            StoredFile {
                content: content.to_vec(),
                sha,
            },
        );
    }

    pub(crate) fn file(&self, branch: &str, path: &str) -> Option<StoredFile> {
        self.state
            .borrow()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .cloned()
    }

    /// Register an open pull request, returning its number.
    pub(crate) fn open_pull(&self, head: &str, base: &str, title: &str, labels: &[&str]) -> u64 {
        let pr = self.make_pull(head, base, title, labels);
        let number = pr.number;
        self.state.borrow_mut().pulls.push(pr);
        number
    }

    /// Register a pull request that only becomes visible from the `call`-th
    /// `find_open_pull_request` call onward.
    pub(crate) fn open_pull_on_call(&self, call: usize, head: &str, base: &str) -> u64 {
        let pr = self.make_pull(head, base, "agent work", &[]);
        let number = pr.number;
        self.state.borrow_mut().pending_pulls.push((call, pr));
        number
    }

    fn make_pull(&self, head: &str, base: &str, title: &str, labels: &[&str]) -> PullRequest {
        let number = self.next_number();
        PullRequest {
            number,
            title: title.to_string(),
            url: format!("https://github.com/{}/pull/{}", self.slug, number),
            head_ref: head.to_string(),
            base_ref: base.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            draft: false,
        }
    }

    fn next_number(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        let number = state.next_number;
        state.next_number += 1;
        number
    }

    /// Fail the next `times` calls of `op` with `error`.
    pub(crate) fn fail(&self, op: &'static str, times: usize, error: RemoteError) {
        let mut state = self.state.borrow_mut();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub(crate) fn fail_merge(&self, number: u64, error: RemoteError) {
        self.state.borrow_mut().merge_failures.insert(number, error);
    }

    pub(crate) fn fail_put(&self, path: &str, error: RemoteError) {
        self.state
            .borrow_mut()
            .put_failures
            .insert(path.to_string(), error);
    }

    /// Every sampled call advances `clock` by `latency`.
    pub(crate) fn with_latency(self, clock: Rc<FakeClock>, latency: Duration) -> Self {
        *self.latency.borrow_mut() = Some((clock, latency));
        self
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.state.borrow().calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn pulls(&self) -> Vec<PullRequest> {
        self.state.borrow().pulls.clone()
    }

    pub(crate) fn issues(&self) -> Vec<NewIssue> {
        self.state.borrow().issues.clone()
    }

    pub(crate) fn comments(&self) -> Vec<(u64, String)> {
        self.state.borrow().comments.clone()
    }

    pub(crate) fn labels_on(&self, number: u64) -> Vec<String> {
        self.state
            .borrow()
            .labels
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn merged(&self) -> Vec<(u64, MergeStrategy)> {
        self.state.borrow().merged.clone()
    }

    fn enter(&self, op: &'static str) -> RemoteResult<()> {
        if let Some((clock, latency)) = self.latency.borrow().as_ref() {
            clock.advance(*latency);
        }
        let mut state = self.state.borrow_mut();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub(crate) fn http_error(status: u16, message: &str) -> RemoteError {
    RemoteError::Http {
        status,
        message: message.to_string(),
    }
}

impl RemoteRepository for FakeRemote {
    fn slug(&self) -> &RepoSlug {
        &self.slug
    }

    fn get_branch_ref(&self, branch: &str) -> RemoteResult<BranchRef> {
        self.enter("get_branch_ref")?;
        self.branch_sha(branch)
            .map(|sha| BranchRef {
                name: branch.to_string(),
                sha,
            })
            .ok_or_else(|| http_error(404, "Not Found"))
    }

    fn create_branch_ref(&self, branch: &str, sha: &str) -> RemoteResult<BranchRef> {
        self.enter("create_branch_ref")?;
        if self.branch_sha(branch).is_some() {
            return Err(http_error(422, "Reference already exists"));
        }
        self.set_branch(branch, sha);
        Ok(BranchRef {
            name: branch.to_string(),
            sha: sha.to_string(),
        })
    }

    fn get_content(&self, branch: &str, path: &str) -> RemoteResult<Option<ContentMeta>> {
        self.enter("get_content")?;
        Ok(self.file(branch, path).map(|f| ContentMeta {
            path: path.to_string(),
            sha: f.sha,
        }))
    }

    fn put_content(&self, update: &ContentUpdate<'_>) -> RemoteResult<()> {
        self.enter("put_content")?;
        if let Some(error) = self.state.borrow().put_failures.get(update.path) {
            return Err(error.clone());
        }
        if self.branch_sha(update.branch).is_none() {
            return Err(http_error(404, "Branch not found"));
        }
        match (self.file(update.branch, update.path), update.sha) {
            (Some(_), None) => {
                return Err(http_error(
                    422,
                    "Invalid request. \"sha\" wasn't supplied.",
                ));
            }
            (Some(existing), Some(sha)) if existing.sha != sha => {
                return Err(http_error(409, "sha does not match"));
            }
            _ => {}
        }
        self.add_file(update.branch, update.path, update.content);
        Ok(())
    }

    fn create_pull_request(&self, request: &NewPullRequest) -> RemoteResult<RemoteRequest> {
        self.enter("create_pull_request")?;
        if self.branch_sha(&request.head).is_none() {
            return Err(http_error(422, "Validation Failed (head invalid)"));
        }
        let number = self.open_pull(&request.head, &request.base, &request.title, &[]);
        Ok(RemoteRequest {
            kind: RequestKind::PullRequest,
            number,
            url: format!("https://github.com/{}/pull/{}", self.slug, number),
            branch: Some(request.head.clone()),
        })
    }

    fn create_issue(&self, issue: &NewIssue) -> RemoteResult<RemoteRequest> {
        self.enter("create_issue")?;
        let number = self.next_number();
        self.state.borrow_mut().issues.push(issue.clone());
        Ok(RemoteRequest {
            kind: RequestKind::Issue,
            number,
            url: format!("https://github.com/{}/issues/{}", self.slug, number),
            branch: None,
        })
    }

    fn list_open_pull_requests(&self, base: &str) -> RemoteResult<Vec<PullRequest>> {
        self.enter("list_open_pull_requests")?;
        Ok(self
            .pulls()
            .into_iter()
            .filter(|pr| pr.base_ref == base)
            .collect())
    }

    fn find_open_pull_request(&self, branch: &str) -> RemoteResult<Option<PullRequest>> {
        self.enter("find_open_pull_request")?;
        let calls = self.calls("find_open_pull_request");
        {
            let mut state = self.state.borrow_mut();
            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending_pulls)
                .into_iter()
                .partition(|(from_call, _)| calls >= *from_call);
            state.pending_pulls = waiting;
            state.pulls.extend(ready.into_iter().map(|(_, pr)| pr));
        }
        Ok(self.pulls().into_iter().find(|pr| pr.head_ref == branch))
    }

    fn add_labels(&self, number: u64, labels: &[String]) -> RemoteResult<()> {
        self.enter("add_labels")?;
        let mut state = self.state.borrow_mut();
        state
            .labels
            .entry(number)
            .or_default()
            .extend(labels.iter().cloned());
        if let Some(pr) = state.pulls.iter_mut().find(|pr| pr.number == number) {
            pr.labels.extend(labels.iter().cloned());
        }
        Ok(())
    }

    fn post_comment(&self, number: u64, body: &str) -> RemoteResult<()> {
        self.enter("post_comment")?;
        self.state
            .borrow_mut()
            .comments
            .push((number, body.to_string()));
        Ok(())
    }

    fn list_comments(&self, number: u64) -> RemoteResult<Vec<String>> {
        self.enter("list_comments")?;
        Ok(self
            .comments()
            .into_iter()
            .filter(|(on, _)| *on == number)
            .map(|(_, body)| body)
            .collect())
    }

    fn compare(&self, base: &str, head: &str) -> RemoteResult<Comparison> {
        self.enter("compare")?;
        if self.branch_sha(base).is_none() || self.branch_sha(head).is_none() {
            return Err(http_error(404, "Not Found"));
        }
        let state = self.state.borrow();
        let ahead_by = state.ahead.get(head).copied().unwrap_or(0);
        let files = state
            .files
            .keys()
            .filter(|(branch, _)| branch == head)
            .map(|(_, path)| path.clone())
            .collect();
        Ok(Comparison {
            status: if ahead_by > 0 { "ahead" } else { "identical" }.to_string(),
            ahead_by,
            behind_by: 0,
            total_commits: ahead_by,
            files,
        })
    }

    fn merge_pull_request(
        &self,
        number: u64,
        strategy: MergeStrategy,
    ) -> RemoteResult<MergeOutcome> {
        self.enter("merge_pull_request")?;
        if let Some(error) = self.state.borrow().merge_failures.get(&number) {
            return Err(error.clone());
        }
        let mut state = self.state.borrow_mut();
        state.merged.push((number, strategy));
        state.pulls.retain(|pr| pr.number != number);
        Ok(MergeOutcome {
            sha: Some(format!("merge-{}", number)),
            message: "Pull Request successfully merged".to_string(),
        })
    }
}
