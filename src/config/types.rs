//! Config value types and default value helpers.

use serde::{Deserialize, Serialize};

/// How managed pull requests are merged by `sync`.
///
/// Always explicit; never auto-detected from repository settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Squash all commits into one (default).
    #[default]
    Squash,
    /// Create a merge commit.
    Merge,
    /// Rebase commits onto the base branch.
    Rebase,
}

impl MergeStrategy {
    /// Parse a merge strategy from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "squash" => Some(Self::Squash),
            "merge" => Some(Self::Merge),
            "rebase" => Some(Self::Rebase),
            _ => None,
        }
    }

    /// Value of the platform's `merge_method` field.
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Squash => "squash",
            Self::Merge => "merge",
            Self::Rebase => "rebase",
        }
    }
}

/// Where the remote API credential is looked up, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variables checked first, in order.
    pub env_vars: Vec<String>,

    /// JSON profile file (`{"profiles": {"<key>": {"key": "<token>"}}}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,

    /// Entry in the profile file holding the token.
    pub profile_key: String,

    /// Command whose stdout is the token (empty disables).
    pub helper_command: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_vars: default_env_vars(),
            profile_path: None,
            profile_key: default_profile_key(),
            helper_command: default_helper_command(),
        }
    }
}

pub(crate) fn default_env_vars() -> Vec<String> {
    vec![
        "BATON_TOKEN".to_string(),
        "GITHUB_TOKEN".to_string(),
        "GH_TOKEN".to_string(),
    ]
}

pub(crate) fn default_profile_key() -> String {
    "github:default".to_string()
}

pub(crate) fn default_helper_command() -> String {
    "gh auth token".to_string()
}

pub(crate) fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

pub(crate) fn default_web_base_url() -> String {
    "https://github.com".to_string()
}

pub(crate) fn default_base_branch() -> String {
    "main".to_string()
}

pub(crate) fn default_remote() -> String {
    "origin".to_string()
}

pub(crate) fn default_branch_prefix() -> String {
    "task-".to_string()
}

pub(crate) fn default_managed_label() -> String {
    "baton".to_string()
}

pub(crate) fn default_extra_labels() -> Vec<String> {
    vec!["automation".to_string()]
}

pub(crate) fn default_title_marker() -> String {
    "[baton]".to_string()
}

pub(crate) fn default_agent_handle() -> String {
    "@codex".to_string()
}

pub(crate) fn default_poll_interval_secs() -> u64 {
    30
}

pub(crate) fn default_max_wait_secs() -> u64 {
    600
}

pub(crate) fn default_push_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_http_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_brief_file_name() -> String {
    "TASK.md".to_string()
}

pub(crate) fn default_brief_dir() -> String {
    ".baton".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}
