// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn started_message_includes_repo() {
    let text = SlackSink::render(&AgentEvent::Started {
        issue: 42,
        title: "[Claude] Add feature".to_string(),
        repo: Some("acme/widgets".to_string()),
    });
    assert_eq!(text, "🚀 Started issue #42: [Claude] Add feature (acme/widgets)");
}

#[test]
fn started_message_without_repo() {
    let text = SlackSink::render(&AgentEvent::Started {
        issue: 42,
        title: "[Codex] Fix bug".to_string(),
        repo: None,
    });
    assert_eq!(text, "🚀 Started issue #42: [Codex] Fix bug");
}

#[test]
fn completed_message_carries_duration() {
    let text = SlackSink::render(&AgentEvent::Completed {
        issue: 7,
        duration: "3m 42s".to_string(),
        repo: None,
    });
    assert_eq!(text, "✅ Issue #7 completed in 3m 42s");
}

#[test]
fn needs_input_snippet_is_bounded_at_500() {
    let text = SlackSink::render(&AgentEvent::NeedsInput {
        issue: 9,
        last_output: Some("y".repeat(600)),
        repo: None,
    });
    assert!(text.contains(&"y".repeat(500)));
    assert!(!text.contains(&"y".repeat(501)));
    assert!(text.contains("… (truncated)"));
}

#[test]
fn error_snippet_is_bounded_at_300() {
    let text = SlackSink::render(&AgentEvent::Errored {
        issue: 9,
        message: "e".repeat(400),
        repo: Some("acme/widgets".to_string()),
    });
    assert!(text.starts_with("❌ Issue #9 failed (acme/widgets): "));
    assert!(text.contains(&"e".repeat(300)));
    assert!(!text.contains(&"e".repeat(301)));
    assert!(text.ends_with("… (truncated)"));
}

#[test]
fn needs_input_without_output_says_so() {
    let text = SlackSink::render(&AgentEvent::NeedsInput {
        issue: 3,
        last_output: None,
        repo: None,
    });
    assert!(text.contains("(no output)"));
}
