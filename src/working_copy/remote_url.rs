//! Scoped replacement of a working copy's remote URL.
//!
//! A credentialed push needs the token inside the remote URL for the duration
//! of one command only. [`RemoteUrlGuard`] records the configured URL, swaps in
//! the temporary one and puts the original back when dropped, so the token is
//! never left in `.git/config` regardless of how the push ends.

use super::LocalWorkingCopy;
use crate::best_effort::{self, BestEffort, SkippedStep};
use crate::error::Result;

/// RAII guard over a temporarily replaced remote URL.
#[derive(Debug)]
pub struct RemoteUrlGuard<'a> {
    copy: &'a LocalWorkingCopy,
    original: String,
    restored: bool,
}

impl<'a> RemoteUrlGuard<'a> {
    /// Read the current URL of the copy's remote, then replace it with `temporary`.
    pub fn swap(copy: &'a LocalWorkingCopy, temporary: &str) -> Result<Self> {
        let original = copy.remote_url()?;
        copy.set_remote_url(temporary)?;
        Ok(Self {
            copy,
            original,
            restored: false,
        })
    }

    /// Restore the original URL now. A failure is reported as a skipped
    /// best-effort step instead of waiting for the drop.
    pub fn restore(mut self) -> Option<SkippedStep> {
        self.restored = true;
        best_effort::attempt(
            BestEffort::RemoteUrlRestore,
            self.copy.set_remote_url(&self.original),
        )
        .err()
    }
}

impl Drop for RemoteUrlGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            let _ = best_effort::attempt(
                BestEffort::RemoteUrlRestore,
                self.copy.set_remote_url(&self.original),
            );
        }
    }
}
