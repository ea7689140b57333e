// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issues and the per-(issue, processor) persistent state record.

use crate::processor::ProcessorName;
use crate::status::ProcessStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discovery label that marks an issue as dispatchable.
pub const READY_LABEL: &str = "agent-ready";

/// A GitHub issue as discovered by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    /// Canonical `owner/name`, annotated at discovery time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
}

/// Durable state of one processor run against one issue.
///
/// The state store maps `(issue_number, processor_name)` to this record;
/// both identity fields are redundant with the map key and are therefore
/// skipped on the wire and patched back in after deserialization.
///
/// `branch` is recorded at reservation time and never mutated afterwards.
/// For any active record, `agent_index` is unique within its processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueState {
    #[serde(skip)]
    pub issue_number: u64,
    #[serde(skip)]
    pub processor_name: ProcessorName,
    pub status: ProcessStatus,
    pub branch: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Slot identity within the processor, in `[0, max_concurrent)`
    pub agent_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// Opaque identifier captured from the processor's first structured
    /// output line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Most recent non-empty stdout line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IssueState {
    /// Fresh record at reservation time: status running, no end time.
    pub fn reserved(
        issue_number: u64,
        processor_name: ProcessorName,
        branch: String,
        start_time: DateTime<Utc>,
        agent_index: u32,
        repo_name: Option<String>,
    ) -> Self {
        Self {
            issue_number,
            processor_name,
            status: ProcessStatus::Running,
            branch,
            start_time,
            end_time: None,
            agent_index,
            repo_name,
            session_id: None,
            last_output: None,
            error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
