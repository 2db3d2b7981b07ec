//! Config loading, validation, and path resolution.

use super::model::Config;
use crate::error::{BatonError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BATON_CONFIG";

/// Directory under the home directory holding config, state and clones.
const HOME_DIR_NAME: &str = ".baton";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            BatonError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Resolve and load the config for this process.
    ///
    /// Order: explicit `--config` path, then `$BATON_CONFIG`, then
    /// `~/.baton/config.yaml`. An explicit path must exist; a missing default
    /// file yields the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Self::load(path.trim());
        }

        match home_dir().map(|home| home.join(HOME_DIR_NAME).join("config.yaml")) {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to `null`, which serde_yaml rejects for structs.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| BatonError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            BatonError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - intervals and timeouts must be positive
    /// - `poll_interval_secs` must not exceed `max_wait_secs`
    /// - `branch_prefix` and `agent_handle` must be non-empty
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("max_wait_secs", self.max_wait_secs),
            ("push_timeout_secs", self.push_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(BatonError::ConfigError(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        if self.poll_interval_secs > self.max_wait_secs {
            return Err(BatonError::ConfigError(format!(
                "config validation failed: poll_interval_secs ({}) must not exceed max_wait_secs ({})",
                self.poll_interval_secs, self.max_wait_secs
            )));
        }

        if self.branch_prefix.trim().is_empty() {
            return Err(BatonError::ConfigError(
                "config validation failed: branch_prefix must be non-empty".to_string(),
            ));
        }

        if self.agent_handle.trim().is_empty() {
            return Err(BatonError::ConfigError(
                "config validation failed: agent_handle must be non-empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory for the event journal and last-dispatch report.
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_home_path(""),
        }
    }

    /// Directory where `--clone` places working copies.
    pub fn clone_root(&self) -> PathBuf {
        match &self.clone_root {
            Some(dir) => PathBuf::from(dir),
            None => default_home_path("repos"),
        }
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// `managed_label` followed by `extra_labels`, without duplicates.
    pub fn request_labels(&self) -> Vec<String> {
        let mut labels = vec![self.managed_label.clone()];
        for label in &self.extra_labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels.retain(|l| !l.trim().is_empty());
        labels
    }
}

fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

fn default_home_path(child: &str) -> PathBuf {
    let base = home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOME_DIR_NAME);
    if child.is_empty() { base } else { base.join(child) }
}
