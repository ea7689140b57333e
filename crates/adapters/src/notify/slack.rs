// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slack sink over chat.postMessage.

use super::{truncate_with_marker, NotifyError, NotifySink};
use async_trait::async_trait;
use imploid_core::AgentEvent;
use serde::Deserialize;
use serde_json::json;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";
const NEEDS_INPUT_SNIPPET_MAX: usize = 500;
const ERROR_SNIPPET_MAX: usize = 300;

pub struct SlackSink {
    http: reqwest::Client,
    bot_token: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackSink {
    pub fn new(bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Slack renders the repo name when the event carries one.
    pub(crate) fn render(event: &AgentEvent) -> String {
        let repo_suffix = |repo: &Option<String>| {
            repo.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default()
        };
        match event {
            AgentEvent::Started { issue, title, repo } => {
                format!("🚀 Started issue #{}: {}{}", issue, title, repo_suffix(repo))
            }
            AgentEvent::Completed { issue, duration, repo } => {
                format!("✅ Issue #{} completed in {}{}", issue, duration, repo_suffix(repo))
            }
            AgentEvent::NeedsInput { issue, last_output, repo } => {
                let snippet = truncate_with_marker(
                    last_output.as_deref().unwrap_or("(no output)"),
                    NEEDS_INPUT_SNIPPET_MAX,
                );
                format!(
                    "⏸️ Issue #{} needs input{}:\n```{}```",
                    issue,
                    repo_suffix(repo),
                    snippet
                )
            }
            AgentEvent::Errored { issue, message, repo } => {
                let snippet = truncate_with_marker(message, ERROR_SNIPPET_MAX);
                format!("❌ Issue #{} failed{}: {}", issue, repo_suffix(repo), snippet)
            }
        }
    }
}

#[async_trait]
impl NotifySink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, event: &AgentEvent) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(POST_MESSAGE_URL)
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": self.channel_id,
                "text": Self::render(event),
            }))
            .send()
            .await?;

        let body: SlackResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::SendFailed(
                body.error.unwrap_or_else(|| "unknown slack error".to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "slack_tests.rs"]
mod tests;
