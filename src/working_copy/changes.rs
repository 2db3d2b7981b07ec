//! Change-set enumeration for the publish pipeline.

use serde::Serialize;

/// How a file differs from the start of the task branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One path in the local change set, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Parse `git diff -z --name-status --no-renames` output.
///
/// With `-z` every entry is `<status>\0<path>\0` and paths are emitted
/// verbatim, so names with non-ASCII bytes, quotes, tabs or newlines survive.
/// Renames are disabled at the source. Type changes and copies count as
/// modifications.
pub fn parse_name_status(output: &str) -> Vec<ChangedFile> {
    let mut fields = output.split('\0');
    let mut files = Vec::new();
    while let (Some(status), Some(path)) = (fields.next(), fields.next()) {
        let Some(code) = status.trim().chars().next() else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        let kind = match code {
            'A' => ChangeKind::Added,
            'D' => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        };
        files.push(ChangedFile::new(path, kind));
    }
    files
}

/// A repository subtree that a task is restricted to.
///
/// Matching is by whole path components: scope `src/api` contains
/// `src/api/lib.rs` but not `src/api_v2/lib.rs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct PathScope {
    prefix: String,
}

impl PathScope {
    /// Normalize a user-supplied scope. Returns `None` for an empty or
    /// root-only scope, which means "no restriction".
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.replace('\\', "/");
        let prefix = normalized
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect::<Vec<_>>()
            .join("/");
        if prefix.is_empty() {
            None
        } else {
            Some(Self { prefix })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    pub fn contains(&self, path: &str) -> bool {
        path.strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Join a file name under the scope.
    pub fn join(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }
}

impl From<PathScope> for String {
    fn from(scope: PathScope) -> Self {
        scope.prefix
    }
}

/// Keep only the files inside `scope` (all files when unscoped).
pub fn filter_to_scope(files: Vec<ChangedFile>, scope: Option<&PathScope>) -> Vec<ChangedFile> {
    match scope {
        Some(scope) => files.into_iter().filter(|f| scope.contains(&f.path)).collect(),
        None => files,
    }
}
