//! Remote API credential resolution.
//!
//! Sources are tried in order and the first non-empty value wins:
//! 1. configured environment variables
//! 2. a JSON profile file
//! 3. an external credential helper command (e.g. `gh auth token`)
//!
//! Tokens are held as [`SecretString`] and never logged.

use crate::config::CredentialsConfig;
use crate::error::{BatonError, Result};
use secrecy::SecretString;
use std::path::Path;
use std::process::Command;

/// Substrings that mark a profile value as an unfilled template.
const PLACEHOLDER_MARKERS: &[&str] = &["YOUR_", "DEIN_", "<token>", "CHANGEME"];

/// Where a resolved credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Env(String),
    Profile(String),
    Helper,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Env(var) => write!(f, "environment variable {}", var),
            CredentialSource::Profile(path) => write!(f, "profile file {}", path),
            CredentialSource::Helper => write!(f, "credential helper"),
        }
    }
}

/// Resolve the credential; `Ok(None)` when no source yields a value.
pub fn resolve(config: &CredentialsConfig) -> Result<Option<(SecretString, CredentialSource)>> {
    for var in &config.env_vars {
        if let Ok(value) = std::env::var(var)
            && !value.trim().is_empty()
        {
            return Ok(Some((
                SecretString::from(value.trim().to_string()),
                CredentialSource::Env(var.clone()),
            )));
        }
    }

    if let Some(path) = &config.profile_path
        && let Some(token) = read_profile(Path::new(path), &config.profile_key)
    {
        return Ok(Some((
            SecretString::from(token),
            CredentialSource::Profile(path.clone()),
        )));
    }

    if !config.helper_command.trim().is_empty()
        && let Some(token) = run_helper(&config.helper_command)?
    {
        return Ok(Some((SecretString::from(token), CredentialSource::Helper)));
    }

    Ok(None)
}

/// Resolve the credential or fail with a configuration error.
pub fn require(config: &CredentialsConfig) -> Result<SecretString> {
    match resolve(config)? {
        Some((token, source)) => {
            tracing::debug!(%source, "resolved remote credential");
            Ok(token)
        }
        None => Err(BatonError::ConfigError(format!(
            "no GitHub token found.\n\n\
             Set one of: {}\n\
             or configure credentials.profile_path / credentials.helper_command in the config file.",
            config.env_vars.join(", ")
        ))),
    }
}

/// Read `profiles.<key>.key` from a JSON profile file. Unreadable files are skipped.
fn read_profile(path: &Path, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let data: serde_json::Value = serde_json::from_str(&content).ok()?;
    let token = data.get("profiles")?.get(key)?.get("key")?.as_str()?.trim();

    if token.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| token.contains(m)) {
        return None;
    }
    Some(token.to_string())
}

/// Run the helper without a shell. A missing binary or non-zero exit yields `None`.
fn run_helper(command: &str) -> Result<Option<String>> {
    let args = shell_words::split(command).map_err(|e| {
        BatonError::ConfigError(format!(
            "failed to parse credentials.helper_command '{}': {}",
            command, e
        ))
    })?;
    let Some((program, rest)) = args.split_first() else {
        return Ok(None);
    };

    let output = match Command::new(program).args(rest).output() {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(program = %program, error = %e, "credential helper unavailable");
            return Ok(None);
        }
    };

    if !output.status.success() {
        tracing::debug!(program = %program, code = ?output.status.code(), "credential helper failed");
        return Ok(None);
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(if token.is_empty() { None } else { Some(token) })
}
