//! Exit code constants for the baton CLI.
//!
//! - 0: Success (dispatch announced, poll completed, or sync fully applied)
//! - 1: User or configuration error (bad args, missing credential, invalid config)
//! - 2: Poll deadline reached before the agent produced an observable result
//! - 3: Local git operation failure
//! - 4: Remote API failure with no recovery path
//! - 5: Partial outcome (some files or pull requests failed)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing credential, invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The completion poller reached its deadline. This is an expected outcome.
pub const TIMED_OUT: i32 = 2;

/// Git operation failure: clone, checkout, commit.
pub const GIT_FAILURE: i32 = 3;

/// Remote API failure that aborted the command.
pub const REMOTE_FAILURE: i32 = 4;

/// Command finished but some items failed (publish files, sync merges).
pub const PARTIAL: i32 = 5;
