//! Local working copy driver.
//!
//! Wraps the git CLI as synchronous operations on one checkout: clone, fetch,
//! forced checkout, commit, fast-forward update, remote URL get/set and change
//! enumeration. Push lives in the publish pipeline because it runs under a
//! timeout and a scoped credential.

pub mod changes;
pub mod remote_url;


pub use changes::{ChangeKind, ChangedFile, PathScope};
pub use remote_url::RemoteUrlGuard;

use crate::error::{BatonError, Result};
use crate::fs::atomic_write;
use crate::git::run_git;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a fast-forward-only update of the base branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FastForward {
    UpToDate { sha: String },
    Advanced { from: String, to: String },
    /// Local history is not an ancestor of the remote tip. Nothing was changed.
    Diverged { local: String, remote: String },
}

/// A local git checkout and the name of the remote it tracks.
#[derive(Debug, Clone)]
pub struct LocalWorkingCopy {
    path: PathBuf,
    remote: String,
}

impl LocalWorkingCopy {
    /// Open an existing checkout.
    pub fn open(path: impl Into<PathBuf>, remote: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.join(".git").exists() {
            return Err(BatonError::UserError(format!(
                "'{}' is not a git working copy (no .git found)",
                path.display()
            )));
        }
        Ok(Self {
            path,
            remote: remote.into(),
        })
    }

    /// Open `path`, cloning `url` into it first when it is not a checkout yet.
    pub fn clone_or_open(url: &str, path: impl Into<PathBuf>, remote: &str) -> Result<Self> {
        let path = path.into();
        if path.join(".git").exists() {
            return Self::open(path, remote);
        }

        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            BatonError::UserError(format!(
                "failed to create clone directory '{}': {}",
                parent.display(),
                e
            ))
        })?;

        info!(url = %url, path = %path.display(), "cloning working copy");
        let target = path.to_string_lossy().to_string();
        run_git(parent, &["clone", "--origin", remote, url, &target])?;
        Self::open(path, remote)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// `<remote>/<branch>`, the remote-tracking name of a branch.
    pub fn tracking_ref(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }

    pub fn remote_url(&self) -> Result<String> {
        Ok(run_git(&self.path, &["remote", "get-url", &self.remote])?.stdout)
    }

    pub fn set_remote_url(&self, url: &str) -> Result<()> {
        // Keep the URL out of the error text; it may carry a credential.
        run_git(&self.path, &["remote", "set-url", &self.remote, url])
            .map(|_| ())
            .map_err(|_| {
                BatonError::GitError(format!(
                    "failed to set URL of remote '{}' in '{}'",
                    self.remote,
                    self.path.display()
                ))
            })
    }

    pub fn fetch(&self) -> Result<()> {
        debug!(remote = %self.remote, "fetching");
        run_git(&self.path, &["fetch", &self.remote, "--prune"])?;
        Ok(())
    }

    /// Whether `<remote>/<branch>` exists locally after the last fetch.
    pub fn has_tracking_branch(&self, branch: &str) -> bool {
        let reference = format!("refs/remotes/{}/{}", self.remote, branch);
        run_git(&self.path, &["rev-parse", "--verify", "--quiet", &reference]).is_ok()
    }

    /// Check out `branch`, force-resetting it to `start_point`. Returns the new HEAD.
    pub fn checkout_reset(&self, branch: &str, start_point: &str) -> Result<String> {
        run_git(&self.path, &["checkout", "-B", branch, start_point])?;
        self.head_sha()
    }

    pub fn head_sha(&self) -> Result<String> {
        self.rev_parse("HEAD")
    }

    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        Ok(run_git(&self.path, &["rev-parse", rev])?.stdout)
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(run_git(&self.path, &["rev-parse", "--abbrev-ref", "HEAD"])?.stdout)
    }

    /// Short-form status lines, untracked files included.
    pub fn status_porcelain(&self) -> Result<Vec<String>> {
        let output = run_git(&self.path, &["status", "--porcelain"])?;
        Ok(output.stdout.lines().map(str::to_string).collect())
    }

    /// Stage everything (or only `scope`) and commit it.
    ///
    /// Returns `false` without committing when nothing is staged.
    pub fn commit_all(&self, message: &str, scope: Option<&PathScope>) -> Result<bool> {
        match scope {
            Some(scope) => run_git(&self.path, &["add", "-A", "--", scope.as_str()])?,
            None => run_git(&self.path, &["add", "-A"])?,
        };

        let staged = run_git(&self.path, &["diff", "--cached", "--name-only"])?;
        if staged.is_empty() {
            debug!("nothing staged; skipping commit");
            return Ok(false);
        }

        run_git(&self.path, &["commit", "-m", message])?;
        Ok(true)
    }

    /// Files changed between `since` and HEAD.
    pub fn changed_files(&self, since: &str) -> Result<Vec<ChangedFile>> {
        let range = format!("{}..HEAD", since);
        let output = run_git(
            &self.path,
            &[
                "-c",
                "core.quotePath=false",
                "diff",
                "-z",
                "--name-status",
                "--no-renames",
                &range,
            ],
        )?;
        Ok(changes::parse_name_status(&output.stdout))
    }

    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        atomic_write(self.path.join(relative), content.as_bytes())
    }

    /// Bring the local `base` branch up to `<remote>/<base>` without ever
    /// rewriting local history.
    pub fn fast_forward(&self, base: &str) -> Result<FastForward> {
        self.fetch()?;

        if self.current_branch()? != base {
            run_git(&self.path, &["checkout", base])?;
        }

        let target = self.tracking_ref(base);
        let local = self.head_sha()?;
        let remote = self.rev_parse(&target)?;

        if local == remote {
            return Ok(FastForward::UpToDate { sha: local });
        }

        let is_ancestor = run_git(&self.path, &["merge-base", "--is-ancestor", &local, &remote]).is_ok();
        if !is_ancestor {
            return Ok(FastForward::Diverged { local, remote });
        }

        run_git(&self.path, &["merge", "--ff-only", &target])?;
        info!(branch = %base, from = %local, to = %remote, "fast-forwarded working copy");
        Ok(FastForward::Advanced {
            from: local,
            to: remote,
        })
    }
}
