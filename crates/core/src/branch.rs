// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git branch naming for issue runs.

use crate::processor::ProcessorName;
use chrono::{DateTime, Utc};

/// Branch name for one (issue, processor) run.
///
/// Shape: `issue-<n>-<processor>-<ts>` where `<ts>` is the UTC wall clock
/// compressed to exactly 14 digits (`yyyymmddhhmmss`). Each processor gets
/// its own branch for the same issue.
pub fn issue_branch(issue: u64, processor: ProcessorName, at: DateTime<Utc>) -> String {
    format!(
        "issue-{}-{}-{}",
        issue,
        processor.as_str(),
        at.format("%Y%m%d%H%M%S")
    )
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
