// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

#[test]
fn branch_shape() {
    let at = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 5).single().unwrap();
    assert_eq!(
        issue_branch(42, ProcessorName::Claude, at),
        "issue-42-claude-20260115093005"
    );
}

#[parameterized(
    claude = { ProcessorName::Claude },
    codex = { ProcessorName::Codex },
)]
fn timestamp_is_exactly_14_digits(processor: ProcessorName) {
    // Single-digit date/time components must zero-pad.
    let at = Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).single().unwrap();
    let branch = issue_branch(7, processor, at);

    let prefix = format!("issue-7-{}-", processor.as_str());
    let ts = branch.strip_prefix(&prefix).unwrap();
    assert_eq!(ts.len(), 14);
    assert!(ts.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(ts, "20260203040506");
}

#[test]
fn processors_get_distinct_branches() {
    let at = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single().unwrap();
    assert_ne!(
        issue_branch(303, ProcessorName::Claude, at),
        issue_branch(303, ProcessorName::Codex, at)
    );
}
