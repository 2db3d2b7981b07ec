//! Primary publish transport: `git push` under a timeout with a scoped credential.

use crate::best_effort::SkippedStep;
use crate::error::{BatonError, Result};
use crate::git::run_git_with_timeout;
use crate::working_copy::{LocalWorkingCopy, RemoteUrlGuard};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// How one primary-transport attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PushAttempt {
    Pushed,
    /// The push ran and exited non-zero.
    Rejected {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The push was killed after the configured limit.
    TimedOut { after_secs: u64 },
    /// The push could not be started (spawn failure, remote URL swap failed).
    Failed { reason: String },
}

impl PushAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self, PushAttempt::Pushed)
    }
}

/// Bulk delivery of the committed local branch to the remote task branch.
pub trait PushTransport {
    fn push(&self, branch: &str) -> PushAttempt;
}

/// Build `https://x-access-token:<token>@host/owner/name.git` from a clone URL.
pub fn credentialed_url(clone_url: &str, token: &SecretString) -> Result<SecretString> {
    let mut url = Url::parse(clone_url).map_err(|e| {
        BatonError::ConfigError(format!("invalid clone URL '{}': {}", clone_url, e))
    })?;
    url.set_username("x-access-token")
        .and_then(|_| url.set_password(Some(token.expose_secret())))
        .map_err(|_| {
            BatonError::ConfigError(format!(
                "clone URL '{}' cannot carry a credential",
                clone_url
            ))
        })?;
    Ok(SecretString::from(url.to_string()))
}

/// Pushes `HEAD` of a local working copy with `git push`.
pub struct GitPushTransport<'a> {
    copy: &'a LocalWorkingCopy,
    /// Temporary remote URL for the duration of the push; `None` pushes to
    /// the configured URL unchanged.
    push_url: Option<SecretString>,
    timeout: Duration,
}

impl<'a> GitPushTransport<'a> {
    pub fn new(copy: &'a LocalWorkingCopy, push_url: Option<SecretString>, timeout: Duration) -> Self {
        Self {
            copy,
            push_url,
            timeout,
        }
    }

    fn run_push(&self, branch: &str) -> PushAttempt {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let args = ["push", "-u", self.copy.remote(), refspec.as_str()];
        let envs = [("GCM_INTERACTIVE", "Never")];

        match run_git_with_timeout(self.copy.path(), &args, &envs, self.timeout) {
            Ok(run) if run.timed_out => PushAttempt::TimedOut {
                after_secs: self.timeout.as_secs(),
            },
            Ok(run) if run.is_success() => PushAttempt::Pushed,
            Ok(run) => PushAttempt::Rejected {
                exit_code: run.exit_code,
                stderr: self.redact(&run.output.stderr),
            },
            Err(e) => PushAttempt::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Strip the credential from text git may echo back.
    fn redact(&self, text: &str) -> String {
        let Some(url) = &self.push_url else {
            return text.to_string();
        };
        let secret = url.expose_secret();
        let mut redacted = text.replace(secret, "<redacted-url>");
        if let Ok(parsed) = Url::parse(secret)
            && let Some(password) = parsed.password()
            && !password.is_empty()
        {
            redacted = redacted.replace(password, "<redacted>");
        }
        redacted
    }
}

impl PushTransport for GitPushTransport<'_> {
    fn push(&self, branch: &str) -> PushAttempt {
        let guard = match &self.push_url {
            Some(url) => match RemoteUrlGuard::swap(self.copy, url.expose_secret()) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    return PushAttempt::Failed {
                        reason: e.to_string(),
                    };
                }
            },
            None => None,
        };

        let attempt = self.run_push(branch);

        let restore_failure: Option<SkippedStep> = guard.and_then(RemoteUrlGuard::restore);
        if restore_failure.is_some() {
            warn!(
                path = %self.copy.path().display(),
                "remote URL could not be restored; check `git remote -v` for a leftover credential"
            );
        }

        match &attempt {
            PushAttempt::Pushed => info!(branch = %branch, "pushed task branch"),
            other => warn!(branch = %branch, attempt = ?other, "push did not complete"),
        }
        attempt
    }
}
