//! Git command runner for baton.
//!
//! Provides a wrapper around git commands with captured stdout/stderr and
//! structured error handling. All local version-control operations go through
//! this module; [`run_git_with_timeout`] is the bounded variant used for push.

use crate::error::{BatonError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Result of a successful git command execution.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self::from_bytes(&output.stdout, &output.stderr)
    }

    fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }

    fn failure_message(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Run a git command with the specified working directory.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(BatonError::GitError)` - On spawn failure or non-zero exit code
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| spawn_error(args, e))?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        Err(BatonError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            output.status.code().unwrap_or(-1),
            git_output.failure_message()
        )))
    }
}

/// Outcome of a git command run under a wall-clock limit.
#[derive(Debug, Clone)]
pub struct TimedGitOutput {
    /// Exit code (None if killed or terminated by a signal).
    pub exit_code: Option<i32>,
    /// Captured output. Empty when the process was killed.
    pub output: GitOutput,
    /// Whether the process was killed because the limit elapsed.
    pub timed_out: bool,
    pub duration: Duration,
}

impl TimedGitOutput {
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run a git command, killing it if it has not exited after `timeout`.
///
/// A non-zero exit or a timeout is reported in the returned value, not as an
/// error; only a failure to spawn git at all is an `Err`.
pub fn run_git_with_timeout<P: AsRef<Path>>(
    cwd: P,
    args: &[&str],
    envs: &[(&str, &str)],
    timeout: Duration,
) -> Result<TimedGitOutput> {
    let mut command = Command::new("git");
    command
        .current_dir(cwd.as_ref())
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }

    let start = Instant::now();
    let mut child = command.spawn().map_err(|e| spawn_error(args, e))?;

    // Drain both pipes on their own threads so a chatty child cannot block on a full pipe.
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;
    let duration = start.elapsed();

    // A killed git may leave helpers holding the pipes open; leave those readers detached.
    let output = if timed_out {
        GitOutput::default()
    } else {
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        GitOutput::from_bytes(&stdout, &stderr)
    };

    Ok(TimedGitOutput {
        exit_code,
        output,
        timed_out,
        duration,
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Wait for a child process with timeout. Returns (exit_code, timed_out).
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status.code(), false)),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process(child);
                    return Ok((None, true));
                }
                thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
            }
            Err(e) => {
                kill_process(child);
                return Err(BatonError::GitError(format!(
                    "failed to check git process status: {}",
                    e
                )));
            }
        }
    }
}

fn kill_process(child: &mut Child) {
    // SIGKILL on Unix, TerminateProcess on Windows.
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(args: &[&str], e: std::io::Error) -> BatonError {
    BatonError::GitError(format!(
        "failed to execute git {}: {} (is git installed?)",
        args.first().unwrap_or(&""),
        e
    ))
}
