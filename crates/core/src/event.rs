// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification events broadcast to configured sinks.

/// One event type serves every sink; each sink reads the fields it needs
/// (Slack renders the repo name, Telegram does not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A processor pipeline started working on an issue
    Started {
        issue: u64,
        /// `[<DisplayName>] <issue title>`
        title: String,
        repo: Option<String>,
    },
    /// A processor finished with exit code 0
    Completed {
        issue: u64,
        /// Pre-formatted `<m>m <s>s` elapsed time
        duration: String,
        repo: Option<String>,
    },
    /// A run is parked awaiting human action
    NeedsInput {
        issue: u64,
        last_output: Option<String>,
        repo: Option<String>,
    },
    /// Spawn failure, timeout, or non-zero exit
    Errored {
        issue: u64,
        message: String,
        repo: Option<String>,
    },
}

impl AgentEvent {
    pub fn issue(&self) -> u64 {
        match self {
            Self::Started { issue, .. }
            | Self::Completed { issue, .. }
            | Self::NeedsInput { issue, .. }
            | Self::Errored { issue, .. } => *issue,
        }
    }

    pub fn repo(&self) -> Option<&str> {
        match self {
            Self::Started { repo, .. }
            | Self::Completed { repo, .. }
            | Self::NeedsInput { repo, .. }
            | Self::Errored { repo, .. } => repo.as_deref(),
        }
    }
}
