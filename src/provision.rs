//! Branch provisioning.
//!
//! Ensures a task branch exists on the remote, anchored at the base branch's
//! current tip. An existing branch is never overwritten: it is reported as
//! found so callers can tell a resumed task from a new one.

use crate::error::{BatonError, Result};
use crate::remote::{BranchRef, RemoteRepository};
use serde::Serialize;
use tracing::info;

/// Result of [`ensure_branch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedBranch {
    pub branch: BranchRef,
    /// `true` when this call created the ref, `false` when it already existed.
    pub created: bool,
}

/// Create `branch` at the tip of `base` unless it already exists.
///
/// Creates at most one ref. A missing base branch is a configuration error;
/// any other remote failure is surfaced as-is.
pub fn ensure_branch(
    remote: &dyn RemoteRepository,
    base: &str,
    branch: &str,
) -> Result<ProvisionedBranch> {
    let base_ref = remote.get_branch_ref(base).map_err(|e| {
        if e.is_not_found() {
            BatonError::ConfigError(format!(
                "base branch '{}' does not exist in {}",
                base,
                remote.slug()
            ))
        } else {
            BatonError::remote(format!("reading base branch '{}'", base), e)
        }
    })?;

    match remote.create_branch_ref(branch, &base_ref.sha) {
        Ok(created) => {
            info!(branch = %branch, sha = %created.sha, "created task branch");
            Ok(ProvisionedBranch {
                branch: created,
                created: true,
            })
        }
        Err(e) if e.is_already_exists() => {
            let existing = remote
                .get_branch_ref(branch)
                .map_err(|e| BatonError::remote(format!("reading branch '{}'", branch), e))?;
            info!(branch = %branch, sha = %existing.sha, "task branch already exists");
            Ok(ProvisionedBranch {
                branch: existing,
                created: false,
            })
        }
        Err(e) => Err(BatonError::remote(format!("creating branch '{}'", branch), e)),
    }
}
