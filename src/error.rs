//! Error types for the baton CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Only errors that abort a command live here; recoverable per-item failures
//! are carried inside outcome structs instead.

use crate::exit_codes;
use crate::remote::RemoteError;
use thiserror::Error;

/// Main error type for baton operations.
#[derive(Error, Debug)]
pub enum BatonError {
    /// User provided invalid arguments or the local system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// Missing credential, invalid config file, missing base branch.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local git operation failed where no fallback exists.
    #[error("Git operation failed: {0}")]
    GitError(String),

    /// Remote API call failed where no fallback exists.
    #[error("Remote request failed ({context}): {source}")]
    RemoteError {
        context: String,
        #[source]
        source: RemoteError,
    },
}

impl BatonError {
    /// Wrap a remote failure with a short description of what was attempted.
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        BatonError::RemoteError {
            context: context.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatonError::UserError(_) => exit_codes::USER_ERROR,
            BatonError::ConfigError(_) => exit_codes::USER_ERROR,
            BatonError::GitError(_) => exit_codes::GIT_FAILURE,
            BatonError::RemoteError { .. } => exit_codes::REMOTE_FAILURE,
        }
    }
}

/// Result type alias for baton operations.
pub type Result<T> = std::result::Result<T, BatonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = BatonError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn config_error_has_correct_exit_code() {
        let err = BatonError::ConfigError("no credential".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn git_error_has_correct_exit_code() {
        let err = BatonError::GitError("clone failed".to_string());
        assert_eq!(err.exit_code(), exit_codes::GIT_FAILURE);
    }

    #[test]
    fn remote_error_has_correct_exit_code() {
        let err = BatonError::remote(
            "create pull request",
            RemoteError::Http {
                status: 403,
                message: "Resource not accessible".to_string(),
            },
        );
        assert_eq!(err.exit_code(), exit_codes::REMOTE_FAILURE);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = BatonError::ConfigError("no GitHub token found".to_string());
        assert_eq!(err.to_string(), "Configuration error: no GitHub token found");

        let err = BatonError::remote(
            "read ref heads/main",
            RemoteError::Http {
                status: 404,
                message: "Not Found".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Remote request failed (read ref heads/main): HTTP 404: Not Found"
        );
    }
}
