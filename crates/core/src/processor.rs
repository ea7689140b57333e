// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of processor backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named external CLI backend that produces code changes for an issue.
///
/// Extending the set means adding a variant here and a driver in the engine
/// crate. The wire form is the lowercase name, which also seeds the GitHub
/// label vocabulary (`claude-working`, `codex-failed`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorName {
    // Default matters: legacy state keys without a processor belong to claude.
    #[default]
    Claude,
    Codex,
}

#[derive(Debug, Error)]
#[error("unknown processor: {0}")]
pub struct UnknownProcessor(pub String);

impl ProcessorName {
    pub const ALL: [ProcessorName; 2] = [Self::Claude, Self::Codex];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }

    /// Human-facing name used in notification titles.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Codex => "Codex",
        }
    }

    pub fn working_label(self) -> String {
        format!("{}-working", self.as_str())
    }

    pub fn completed_label(self) -> String {
        format!("{}-completed", self.as_str())
    }

    pub fn failed_label(self) -> String {
        format!("{}-failed", self.as_str())
    }
}

impl fmt::Display for ProcessorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorName {
    type Err = UnknownProcessor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            other => Err(UnknownProcessor(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
