//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for baton.
///
/// Loaded once at process start from `~/.baton/config.yaml` (or `--config`)
/// and passed by reference into every component. Unknown fields in the YAML
/// are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Platform
    // =========================================================================
    /// REST API root (GitHub Enterprise uses `https://host/api/v3`).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Browser root, used for clone URLs and next-step links.
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    // =========================================================================
    // Git settings
    // =========================================================================
    /// Base branch used when `--base` is not given.
    #[serde(default = "default_base_branch")]
    pub default_base_branch: String,

    /// Name of the remote in local working copies.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Hard wall-clock limit for `git push` before falling back to the content API.
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,

    /// Where `--clone` places working copies (default: `~/.baton/repos`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_root: Option<String>,

    // =========================================================================
    // Task identity
    // =========================================================================
    /// Prefix of generated task branch names.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Label added to pull requests and issues opened by baton.
    #[serde(default = "default_managed_label")]
    pub managed_label: String,

    /// Additional labels added alongside `managed_label`.
    #[serde(default = "default_extra_labels")]
    pub extra_labels: Vec<String>,

    /// Marker prefixed to pull request and issue titles.
    #[serde(default = "default_title_marker")]
    pub title_marker: String,

    /// Mention that triggers the remote agent (e.g. `@codex`).
    #[serde(default = "default_agent_handle")]
    pub agent_handle: String,

    // =========================================================================
    // Dispatch
    // =========================================================================
    /// Whether to open an advisory tracking issue next to the pull request.
    #[serde(default = "default_true")]
    pub create_advisory_issue: bool,

    /// Whether to seed the task branch with a task brief file.
    #[serde(default = "default_true")]
    pub write_task_brief: bool,

    #[serde(default = "default_brief_file_name")]
    pub brief_file_name: String,

    /// Directory for the brief when the task has no path scope.
    #[serde(default = "default_brief_dir")]
    pub brief_dir: String,

    // =========================================================================
    // Polling
    // =========================================================================
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Poll deadline.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    // =========================================================================
    // Sync
    // =========================================================================
    #[serde(default)]
    pub merge_strategy: MergeStrategy,

    // =========================================================================
    // State
    // =========================================================================
    /// Event journal and last-dispatch report location (default: `~/.baton`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            web_base_url: default_web_base_url(),
            http_timeout_secs: default_http_timeout_secs(),
            credentials: CredentialsConfig::default(),
            default_base_branch: default_base_branch(),
            remote: default_remote(),
            push_timeout_secs: default_push_timeout_secs(),
            clone_root: None,
            branch_prefix: default_branch_prefix(),
            managed_label: default_managed_label(),
            extra_labels: default_extra_labels(),
            title_marker: default_title_marker(),
            agent_handle: default_agent_handle(),
            create_advisory_issue: default_true(),
            write_task_brief: default_true(),
            brief_file_name: default_brief_file_name(),
            brief_dir: default_brief_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            merge_strategy: MergeStrategy::default(),
            state_dir: None,
        }
    }
}
