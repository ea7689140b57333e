// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle status of one (issue, processor) run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a processor run against a single issue.
///
/// Only `Running` and `NeedsInput` count as active for slot accounting.
/// `NeedsInput` is reserved: the store persists and surfaces it, but no
/// driver exit path produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Reserved but not yet launched
    Pending,
    /// Child process is being supervised
    Running,
    /// Awaiting human action; the state entry is retained
    NeedsInput,
    /// Child exited 0
    Completed,
    /// Spawn failure, timeout, or non-zero exit
    Failed,
}

impl ProcessStatus {
    /// Active states hold an agent slot until reconciled.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::NeedsInput)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::NeedsInput => write!(f, "needs_input"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
