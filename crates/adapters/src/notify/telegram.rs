// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telegram sink over the bot sendMessage API.

use super::{truncate_with_marker, NotifyError, NotifySink};
use async_trait::async_trait;
use imploid_core::AgentEvent;
use serde_json::json;

const MESSAGE_MAX: usize = 4000;

pub struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Telegram messages omit the repo and are bounded as a whole.
    pub(crate) fn render(event: &AgentEvent) -> String {
        let text = match event {
            AgentEvent::Started { issue, title, .. } => {
                format!("🚀 Started issue #{}: {}", issue, title)
            }
            AgentEvent::Completed { issue, duration, .. } => {
                format!("✅ Issue #{} completed in {}", issue, duration)
            }
            AgentEvent::NeedsInput { issue, last_output, .. } => {
                format!(
                    "⏸️ Issue #{} needs input:\n{}",
                    issue,
                    last_output.as_deref().unwrap_or("(no output)")
                )
            }
            AgentEvent::Errored { issue, message, .. } => {
                format!("❌ Issue #{} failed: {}", issue, message)
            }
        };
        truncate_with_marker(&text, MESSAGE_MAX)
    }
}

#[async_trait]
impl NotifySink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, event: &AgentEvent) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": Self::render(event),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::SendFailed(format!(
                "telegram returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "telegram_tests.rs"]
mod tests;
