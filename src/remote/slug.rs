//! Repository identifiers (`owner/name`).

use crate::error::{BatonError, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Matches `https://host/owner/name(.git)`, `ssh://git@host/owner/name` and `git@host:owner/name`.
static REMOTE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z+]+://)?(?:[^@/]+@)?[^/:]+[:/]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$")
        .expect("Invalid remote URL regex")
});

/// A validated `owner/name` repository slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Parse an `owner/name` string.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || {
            BatonError::ConfigError(format!(
                "invalid repository '{}', expected owner/name",
                raw
            ))
        };
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Derive the slug from a git remote URL.
    pub fn from_remote_url(url: &str) -> Result<Self> {
        let caps = REMOTE_URL_REGEX.captures(url.trim()).ok_or_else(|| {
            BatonError::ConfigError(format!(
                "cannot derive owner/name from remote URL '{}'",
                url
            ))
        })?;
        Ok(Self {
            owner: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }

    /// Browser URL of a branch.
    pub fn branch_url(&self, web_base_url: &str, branch: &str) -> String {
        format!("{}/tree/{}", self.web_url(web_base_url), branch)
    }

    /// Browser URL of the repository.
    pub fn web_url(&self, web_base_url: &str) -> String {
        format!("{}/{}", web_base_url.trim_end_matches('/'), self)
    }

    /// HTTPS clone URL.
    pub fn clone_url(&self, web_base_url: &str) -> String {
        format!("{}.git", self.web_url(web_base_url))
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.to_string()
    }
}
