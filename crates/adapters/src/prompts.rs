// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template resolution and caching.
//!
//! Overrides in the user's prompt directory shadow installed defaults;
//! templates are cached by absolute path for the process lifetime
//! (invalidation is a restart).

use imploid_core::{config::expand_home, ProcessorName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Token replaced with the decimal issue number.
const ISSUE_NUMBER_TOKEN: &str = "${issueNumber}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no prompt template found for {name} (tried {candidates:?})")]
    NotFound { name: String, candidates: Vec<PathBuf> },

    #[error("failed to read prompt {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct PromptLoader {
    /// User overrides, normally `~/.imploid/prompts`
    override_dir: PathBuf,
    /// Templates shipped with the installation
    defaults_dir: PathBuf,
    cache: Mutex<HashMap<PathBuf, String>>,
}

impl PromptLoader {
    pub fn new(override_dir: impl Into<PathBuf>, defaults_dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: override_dir.into(),
            defaults_dir: defaults_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve, read, and substitute the prompt for one run.
    pub fn load(
        &self,
        processor: ProcessorName,
        issue: u64,
        override_path: Option<&str>,
    ) -> Result<String, PromptError> {
        let candidates = self.candidates(processor, override_path);
        for candidate in &candidates {
            if let Some(template) = self.read_cached(candidate)? {
                return Ok(substitute_issue_number(&template, issue));
            }
        }
        let name = override_path
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-default", processor));
        Err(PromptError::NotFound { name, candidates })
    }

    /// Candidate files in precedence order.
    fn candidates(&self, processor: ProcessorName, override_path: Option<&str>) -> Vec<PathBuf> {
        match override_path {
            Some(raw) if raw.starts_with('/') || raw.starts_with('~') => {
                vec![with_md_extension(expand_home(raw))]
            }
            Some(relative) => {
                let file = format!("{}.md", relative);
                vec![self.override_dir.join(&file), self.defaults_dir.join(&file)]
            }
            None => {
                let file = format!("{}-default.md", processor);
                vec![self.override_dir.join(&file), self.defaults_dir.join(&file)]
            }
        }
    }

    /// Read a candidate through the cache. `Ok(None)` means the file does
    /// not exist; other IO failures are real errors.
    fn read_cached(&self, path: &Path) -> Result<Option<String>, PromptError> {
        if let Some(cached) = self.cache.lock().get(path) {
            return Ok(Some(cached.clone()));
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                self.cache.lock().insert(path.to_path_buf(), text.clone());
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PromptError::Io { path: path.to_path_buf(), source: e }),
        }
    }
}

/// Append `.md` when the path has no extension at all.
fn with_md_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.with_extension("md")
    } else {
        path
    }
}

/// Replace every literal `${issueNumber}` token; no other character of the
/// template changes.
pub fn substitute_issue_number(template: &str, issue: u64) -> String {
    template.replace(ISSUE_NUMBER_TOKEN, &issue.to_string())
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
