// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! imploid-adapters: narrow interfaces over the outside world.
//!
//! Subprocesses, the GitHub REST API, notification webhooks, and prompt
//! templates. Everything here is consumed by the engine through traits so
//! tests can substitute fakes.

pub mod github;
pub mod notify;
pub mod prompts;
pub mod subprocess;

pub use github::{GitHubAdapter, GitHubClient, GitHubError};
#[cfg(any(test, feature = "test-support"))]
pub use github::{FakeGitHub, LabelChange};
pub use notify::{Notifier, NotifyError, NotifySink, SlackSink, TelegramSink};
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeSink;
pub use prompts::{PromptError, PromptLoader};
pub use subprocess::{run_command, spawn_streaming, CommandOutput, RunOptions, SpawnError, SpawnedChild};
