// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration model and loading.
//!
//! Config lives at `~/.imploid/config.json`, human-edited or generated by
//! the companion setup wizard. The core treats it as read-only.

use crate::processor::ProcessorName;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECONDS: f64 = 3600.0;
const DEFAULT_CHECK_INTERVAL_SECONDS: f64 = 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found at {0} (run `imploid --config` to create one)")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub github: GithubConfig,
    #[serde(default)]
    pub processors: ProcessorsConfig,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub token: String,
    pub repos: Vec<RepoConfig>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

/// One watched repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoConfig {
    /// Canonical `owner/name`
    pub name: String,
    /// Root under which per-processor agent worktrees are created
    pub base_repo_path: String,
}

impl RepoConfig {
    /// Base path with `~/` expanded.
    pub fn base_path(&self) -> PathBuf {
        expand_home(&self.base_repo_path)
    }

    /// Trailing `name` component of `owner/name`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: Vec<ProcessorName>,
    #[serde(default)]
    pub claude: ProcessorOverrides,
    #[serde(default)]
    pub codex: ProcessorOverrides,
}

impl Default for ProcessorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            claude: ProcessorOverrides::default(),
            codex: ProcessorOverrides::default(),
        }
    }
}

/// Raw per-processor options; anything absent falls back to the processor's
/// built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessorOverrides {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub check_interval_seconds: Option<f64>,
    #[serde(default)]
    pub prompt_path: Option<String>,
}

/// Resolved per-processor settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    /// Binary path (defaults to the processor name, resolved via PATH)
    pub path: String,
    pub timeout: Duration,
    pub check_interval: Duration,
    /// Prompt template key or absolute path
    pub prompt_path: Option<String>,
}

impl ProcessorSettings {
    pub fn defaults_for(processor: ProcessorName) -> Self {
        Self {
            path: processor.as_str().to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
            check_interval: Duration::from_secs_f64(DEFAULT_CHECK_INTERVAL_SECONDS),
            prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl Config {
    /// Default location: `~/.imploid/config.json`.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.json")
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Io { path: path.to_path_buf(), source: e });
            }
        };

        let config: Config = serde_json::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        if self.github.token.trim().is_empty() {
            return Err(invalid("github.token must not be empty".to_string()));
        }
        if self.github.repos.is_empty() {
            return Err(invalid("github.repos must list at least one repository".to_string()));
        }
        if self.github.max_concurrent < 1 {
            return Err(invalid("github.max_concurrent must be at least 1".to_string()));
        }
        for repo in &self.github.repos {
            if !repo.name.contains('/') {
                return Err(invalid(format!(
                    "github.repos entry {:?} is not of the form owner/name",
                    repo.name
                )));
            }
        }
        Ok(())
    }

    /// Resolved settings for one processor, defaults applied and paths
    /// home-expanded.
    pub fn processor_settings(&self, processor: ProcessorName) -> ProcessorSettings {
        let overrides = match processor {
            ProcessorName::Claude => &self.processors.claude,
            ProcessorName::Codex => &self.processors.codex,
        };
        let defaults = ProcessorSettings::defaults_for(processor);
        ProcessorSettings {
            path: overrides
                .path
                .as_deref()
                .map(|p| expand_home(p).display().to_string())
                .unwrap_or(defaults.path),
            timeout: overrides
                .timeout_seconds
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.timeout),
            check_interval: overrides
                .check_interval_seconds
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.check_interval),
            prompt_path: overrides.prompt_path.clone(),
        }
    }

}

fn default_max_concurrent() -> u32 {
    3
}

fn default_enabled() -> Vec<ProcessorName> {
    vec![ProcessorName::Claude]
}

/// `~/.imploid`, the home of config, state, lock, and prompt overrides.
pub fn config_dir() -> PathBuf {
    home_dir().join(".imploid")
}

/// Expand a leading `~` or `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
