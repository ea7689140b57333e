// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification fanout to configured sinks.
//!
//! Sinks are best-effort: a failing webhook logs and is forgotten; it never
//! surfaces to the scheduler.

mod slack;
mod telegram;

pub use slack::SlackSink;
pub use telegram::TelegramSink;

use async_trait::async_trait;
use futures_util::future::join_all;
use imploid_core::{AgentEvent, Config};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One notification destination.
#[async_trait]
pub trait NotifySink: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn send(&self, event: &AgentEvent) -> Result<(), NotifyError>;
}

/// Broadcasts each event to every configured sink concurrently. Zero sinks
/// is a valid configuration.
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn NotifySink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the fanout from config; absent sections mean no sink.
    pub fn from_config(config: &Config) -> Self {
        let mut notifier = Self::new();
        if let Some(slack) = &config.slack {
            notifier.push(Arc::new(SlackSink::new(&slack.bot_token, &slack.channel_id)));
        }
        if let Some(telegram) = &config.telegram {
            notifier.push(Arc::new(TelegramSink::new(&telegram.bot_token, &telegram.chat_id)));
        }
        notifier
    }

    pub fn push(&mut self, sink: Arc<dyn NotifySink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to all sinks in parallel; failures log and are swallowed.
    pub async fn broadcast(&self, event: AgentEvent) {
        let sends = self.sinks.iter().map(|sink| {
            let event = event.clone();
            let sink = Arc::clone(sink);
            async move {
                if let Err(e) = sink.send(&event).await {
                    warn!(sink = sink.name(), issue = event.issue(), error = %e, "notification failed");
                }
            }
        });
        join_all(sends).await;
    }

    pub async fn notify_start(&self, issue: u64, title: &str, repo: Option<&str>) {
        self.broadcast(AgentEvent::Started {
            issue,
            title: title.to_string(),
            repo: repo.map(str::to_string),
        })
        .await;
    }

    pub async fn notify_complete(&self, issue: u64, duration: &str, repo: Option<&str>) {
        self.broadcast(AgentEvent::Completed {
            issue,
            duration: duration.to_string(),
            repo: repo.map(str::to_string),
        })
        .await;
    }

    pub async fn notify_needs_input(
        &self,
        issue: u64,
        last_output: Option<&str>,
        repo: Option<&str>,
    ) {
        self.broadcast(AgentEvent::NeedsInput {
            issue,
            last_output: last_output.map(str::to_string),
            repo: repo.map(str::to_string),
        })
        .await;
    }

    pub async fn notify_error(&self, issue: u64, message: &str, repo: Option<&str>) {
        self.broadcast(AgentEvent::Errored {
            issue,
            message: message.to_string(),
            repo: repo.map(str::to_string),
        })
        .await;
    }
}

/// Truncate to `max` characters, appending a marker when anything was cut.
pub(crate) fn truncate_with_marker(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{}… (truncated)", kept)
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{NotifyError, NotifySink};
    use async_trait::async_trait;
    use imploid_core::AgentEvent;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recording sink for tests. Optionally fails every send to exercise
    /// the fanout's swallow-and-log behavior.
    #[derive(Clone, Default)]
    pub struct FakeSink {
        events: Arc<Mutex<Vec<AgentEvent>>>,
        failing: bool,
    }

    impl FakeSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self { events: Arc::default(), failing: true }
        }

        pub fn events(&self) -> Vec<AgentEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl NotifySink for FakeSink {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn send(&self, event: &AgentEvent) -> Result<(), NotifyError> {
            if self.failing {
                return Err(NotifyError::SendFailed("scripted failure".to_string()));
            }
            self.events.lock().push(event.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSink;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
