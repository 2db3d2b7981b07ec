//! Dispatched task model.
//!
//! A [`Task`] is created once per dispatch and never mutated. Its branch name
//! is `<prefix><unix seconds>`, which is human-traceable and unique per
//! dispatch as long as the provisioner refuses to adopt a branch that already
//! belongs to another task (see `commands::dispatch`).

use crate::error::{BatonError, Result};
use crate::remote::RepoSlug;
use crate::working_copy::PathScope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Longest task summary used in titles and commit subjects.
pub const TITLE_SUMMARY_LEN: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub description: String,
    pub repo: RepoSlug,
    pub base: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<PathScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        description: &str,
        repo: RepoSlug,
        base: &str,
        branch: String,
        scope: Option<PathScope>,
        local_path: Option<PathBuf>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        Self::validate_description(description)?;
        let description = description.trim();
        if base.trim().is_empty() {
            return Err(BatonError::UserError(
                "base branch must not be empty".to_string(),
            ));
        }
        Ok(Self {
            description: description.to_string(),
            repo,
            base: base.trim().to_string(),
            branch,
            scope,
            local_path,
            created_at,
        })
    }

    /// Reject descriptions that would announce nothing to the agent.
    pub fn validate_description(description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(BatonError::UserError(
                "task description must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Branch name for a dispatch at `at`. `offset` moves the suffix forward
    /// when the first candidate is already taken.
    pub fn branch_name(prefix: &str, at: DateTime<Utc>, offset: i64) -> String {
        format!("{}{}", prefix, at.timestamp() + offset)
    }

    /// The task's identifier: its branch name.
    pub fn id(&self) -> &str {
        &self.branch
    }

    /// First line of the description, cut to `max` characters.
    pub fn summary(&self, max: usize) -> String {
        let first_line = self.description.lines().next().unwrap_or_default().trim();
        if first_line.chars().count() <= max {
            first_line.to_string()
        } else {
            let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
            format!("{}...", cut.trim_end())
        }
    }

    /// Pull request and issue title: `<marker> <summary>`.
    pub fn title(&self, marker: &str) -> String {
        let summary = self.summary(TITLE_SUMMARY_LEN);
        if marker.is_empty() {
            summary
        } else {
            format!("{} {}", marker, summary)
        }
    }

    /// Repository path of the task brief: under the scope when there is one,
    /// otherwise under `brief_dir`.
    pub fn brief_path(&self, brief_dir: &str, file_name: &str) -> String {
        match &self.scope {
            Some(scope) => scope.join(file_name),
            None => match PathScope::new(brief_dir) {
                Some(dir) => dir.join(file_name),
                None => file_name.to_string(),
            },
        }
    }

    pub fn render_brief(&self) -> String {
        let mut brief = String::from("# Task\n\n");
        brief.push_str(&self.description);
        brief.push_str("\n\n");
        brief.push_str(&format!("- Repository: {}\n", self.repo));
        brief.push_str(&format!("- Branch: {}\n", self.branch));
        brief.push_str(&format!("- Base: {}\n", self.base));
        if let Some(scope) = &self.scope {
            brief.push_str(&format!("- Scope: {}\n", scope.as_str()));
        }
        brief.push_str(&format!("- Created: {}\n", self.created_at.to_rfc3339()));
        brief
    }

    pub fn seed_commit_message(&self, marker: &str) -> String {
        format!("{} seed: {}", marker, self.summary(60)).trim().to_string()
    }
}
