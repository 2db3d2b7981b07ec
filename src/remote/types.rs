//! Normalized remote data model shared by every component.

use serde::Serialize;

/// A branch ref and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    pub name: String,
    pub sha: String,
}

/// Metadata of a file that exists on a remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub path: String,
    /// Content-addressed blob SHA; required to replace an existing file.
    pub sha: String,
}

/// A single-file content write.
#[derive(Debug, Clone)]
pub struct ContentUpdate<'a> {
    pub branch: &'a str,
    pub path: &'a str,
    pub content: &'a [u8],
    pub message: &'a str,
    /// Revision marker of the file being replaced, `None` when creating.
    pub sha: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    PullRequest,
    Issue,
}

/// A remote-visible request for work.
///
/// The pull request is the authoritative completion and merge unit; an issue
/// is advisory tracking only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRequest {
    pub kind: RequestKind,
    pub number: u64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// An open pull request as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub head_ref: String,
    pub base_ref: String,
    pub labels: Vec<String>,
    pub draft: bool,
}

impl PullRequest {
    pub fn as_request(&self) -> RemoteRequest {
        RemoteRequest {
            kind: RequestKind::PullRequest,
            number: self.number,
            url: self.url.clone(),
            branch: Some(self.head_ref.clone()),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Result of comparing `base...head`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    /// `ahead`, `behind`, `diverged` or `identical`.
    pub status: String,
    pub ahead_by: u64,
    pub behind_by: u64,
    pub total_commits: u64,
    pub files: Vec<String>,
}

/// A successful merge as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub sha: Option<String>,
    pub message: String,
}
