// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-processor subprocess supervision.
//!
//! The driver owns one child process for one (issue, processor) run: it
//! prepares the worktree, assembles the processor's command line, frames
//! stdout into lines, captures the session id, and races the child's exit
//! against the configured timeout.

use crate::workspace::{GitError, WorkspaceAdapter};
use imploid_adapters::prompts::{PromptError, PromptLoader};
use imploid_adapters::subprocess::{spawn_streaming, RunOptions, SpawnError, SpawnedChild};
use imploid_adapters::Notifier;
use imploid_core::{issue_branch, Clock, ProcessStatus, ProcessorName, ProcessorSettings, RepoConfig};
use imploid_storage::{SharedStateStore, StorageError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the supervision loop concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOutcome {
    pub status: ProcessStatus,
    pub session_id: Option<String>,
}

/// Processor-specific command line. The prompt always travels as a single
/// argument; codex takes it as the last positional.
pub fn build_argv(processor: ProcessorName, binary: &str, prompt: &str) -> Vec<String> {
    match processor {
        ProcessorName::Claude => vec![
            binary.to_string(),
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ],
        ProcessorName::Codex => vec![
            binary.to_string(),
            "exec".to_string(),
            "--full-auto".to_string(),
            "--dangerously-bypass-approvals-and-sandbox".to_string(),
            prompt.to_string(),
        ],
    }
}

/// Best-effort session id from one stdout line: the first JSON object with
/// a `session_id` or `sessionId` string field.
pub(crate) fn extract_session_id(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let obj = value.as_object()?;
    obj.get("session_id")
        .or_else(|| obj.get("sessionId"))?
        .as_str()
        .map(str::to_string)
}

pub struct ProcessorDriver<W: WorkspaceAdapter, C: Clock> {
    processor: ProcessorName,
    settings: ProcessorSettings,
    workspace: W,
    prompts: Arc<PromptLoader>,
    notifier: Notifier,
    store: SharedStateStore,
    clock: C,
}

impl<W: WorkspaceAdapter, C: Clock> ProcessorDriver<W, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        processor: ProcessorName,
        settings: ProcessorSettings,
        workspace: W,
        prompts: Arc<PromptLoader>,
        notifier: Notifier,
        store: SharedStateStore,
        clock: C,
    ) -> Self {
        Self { processor, settings, workspace, prompts, notifier, store, clock }
    }

    /// Run the processor against one issue in the given agent slot.
    pub async fn run(
        &self,
        issue_number: u64,
        agent_index: u32,
        repo: &RepoConfig,
    ) -> Result<DriverOutcome, DriverError> {
        // Existing state keeps its branch; otherwise mint a fresh one
        let branch = {
            let store = self.store.lock();
            store
                .get(issue_number, self.processor)
                .map(|s| s.branch.clone())
                .unwrap_or_else(|| issue_branch(issue_number, self.processor, self.clock.now_utc()))
        };

        let path = self.workspace.ensure_clone(self.processor, agent_index, repo).await?;
        self.workspace.prepare_issue_branch(&path, &branch).await?;

        let prompt = self.prompts.load(
            self.processor,
            issue_number,
            self.settings.prompt_path.as_deref(),
        )?;
        let argv = build_argv(self.processor, &self.settings.path, &prompt);

        let mut child = match spawn_streaming(&argv, &RunOptions::in_dir(&path)) {
            Ok(child) => child,
            Err(e) => {
                self.notifier
                    .notify_error(
                        issue_number,
                        &format!("[{}] {}", self.processor.display_name(), e),
                        Some(&repo.name),
                    )
                    .await;
                return Err(e.into());
            }
        };
        debug!(issue = issue_number, processor = %self.processor, pid = ?child.id(), "processor spawned");

        let stdout_task = self.watch_stdout(&mut child, issue_number);
        let stderr_task = collect_stderr(&mut child);

        self.supervise(&mut child, stdout_task, stderr_task, issue_number, repo, &path)
            .await
    }

    /// Frame stdout into trimmed lines: track the last non-empty line in
    /// the state entry, and persist the first session id seen.
    fn watch_stdout(&self, child: &mut SpawnedChild, issue_number: u64) -> JoinHandle<()> {
        let Some(stdout) = child.take_stdout() else {
            return tokio::spawn(async {});
        };
        let store = Arc::clone(&self.store);
        let processor = self.processor;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut session_seen = false;
            while let Ok(Some(raw)) = lines.next_line().await {
                let line = raw.trim();
                if line.is_empty() {
                    continue;
                }
                let session_id = if session_seen { None } else { extract_session_id(line) };
                let mut store = store.lock();
                if let Some(state) = store.get_mut(issue_number, processor) {
                    state.last_output = Some(line.to_string());
                    if let Some(session_id) = session_id {
                        state.session_id = Some(session_id);
                        session_seen = true;
                        if let Err(e) = store.save() {
                            warn!(issue = issue_number, error = %e, "failed to persist session id");
                        }
                    }
                }
            }
        })
    }

    /// Race exit against the check-interval ticker; kill on wall-clock
    /// timeout, then drain streams before reporting.
    async fn supervise(
        &self,
        child: &mut SpawnedChild,
        stdout_task: JoinHandle<()>,
        stderr_task: JoinHandle<String>,
        issue_number: u64,
        repo: &RepoConfig,
        path: &Path,
    ) -> Result<DriverOutcome, DriverError> {
        let started = self.clock.now();
        let exit_code = loop {
            tokio::select! {
                code = child.wait() => break Some(code?),
                _ = tokio::time::sleep(self.settings.check_interval) => {
                    if self.clock.now().duration_since(started) >= self.settings.timeout {
                        break None;
                    }
                }
            }
        };

        let timed_out = exit_code.is_none();
        if timed_out {
            warn!(issue = issue_number, processor = %self.processor, "timeout reached, killing child");
            child.kill();
            let _ = child.wait().await;
        }

        // Streams hit EOF once the child is dead; drain before reporting
        let _ = stdout_task.await;
        let stderr = stderr_task.await.unwrap_or_default();

        let (session_id, last_output) = {
            let store = self.store.lock();
            let state = store.get(issue_number, self.processor);
            (
                state.and_then(|s| s.session_id.clone()),
                state.and_then(|s| s.last_output.clone()),
            )
        };

        if timed_out {
            let mut message = format!(
                "[{}] Process timed out after {} seconds",
                self.processor.display_name(),
                self.settings.timeout.as_secs_f64(),
            );
            if let Some(last) = &last_output {
                message.push_str(&format!("\nLast output: {}", last));
            }
            self.notifier.notify_error(issue_number, &message, Some(&repo.name)).await;
            return Ok(DriverOutcome { status: ProcessStatus::Failed, session_id });
        }

        let code = exit_code.unwrap_or(-1);
        if code == 0 {
            debug!(issue = issue_number, processor = %self.processor, dir = %path.display(), "processor completed");
            return Ok(DriverOutcome { status: ProcessStatus::Completed, session_id });
        }

        let detail = if stderr.trim().is_empty() { "Unknown error" } else { stderr.trim() };
        self.notifier
            .notify_error(
                issue_number,
                &format!(
                    "[{}] Process exited with code {}: {}",
                    self.processor.display_name(),
                    code,
                    detail
                ),
                Some(&repo.name),
            )
            .await;
        Ok(DriverOutcome { status: ProcessStatus::Failed, session_id })
    }
}

/// Accumulate stderr verbatim for post-mortem reporting.
fn collect_stderr(child: &mut SpawnedChild) -> JoinHandle<String> {
    let Some(mut stderr) = child.take_stderr() else {
        return tokio::spawn(async { String::new() });
    };
    tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    })
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
