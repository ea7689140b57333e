// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler tick: discover → reserve slots → launch fanned-out
//! processors → reconcile labels and state.
//!
//! All state-store mutations happen behind one mutex; every externally
//! observable transition (label change, notification) is preceded by a save
//! so crash recovery sees at least that transition.

use crate::driver::{DriverError, ProcessorDriver};
use crate::workspace::WorkspaceAdapter;
use imploid_adapters::github::{GitHubAdapter, GitHubError};
use imploid_adapters::prompts::PromptLoader;
use imploid_adapters::Notifier;
use imploid_core::{
    format_duration, issue_branch, Clock, Config, Issue, IssueState, ProcessStatus, ProcessorName,
    ProcessorSettings, RepoConfig, READY_LABEL,
};
use imploid_storage::{SharedStateStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Pipeline-local failures; they mark one (issue, processor) entry failed
/// and never abort the tick.
#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The slice of configuration the scheduler needs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub repos: Vec<RepoConfig>,
    pub max_concurrent: u32,
    pub enabled: Vec<ProcessorName>,
    pub processors: HashMap<ProcessorName, ProcessorSettings>,
}

impl SchedulerConfig {
    /// Project the full config, optionally intersecting the enabled set
    /// with a per-run override.
    pub fn from_config(config: &Config, enabled_override: Option<&[ProcessorName]>) -> Self {
        let enabled: Vec<ProcessorName> = match enabled_override {
            Some(requested) => config
                .processors
                .enabled
                .iter()
                .copied()
                .filter(|p| requested.contains(p))
                .collect(),
            None => config.processors.enabled.clone(),
        };
        let processors = enabled.iter().map(|&p| (p, config.processor_settings(p))).collect();
        Self {
            repos: config.github.repos.clone(),
            max_concurrent: config.github.max_concurrent,
            enabled,
            processors,
        }
    }

    fn repo(&self, name: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.name == name)
    }

    fn settings(&self, processor: ProcessorName) -> ProcessorSettings {
        self.processors
            .get(&processor)
            .cloned()
            .unwrap_or_else(|| ProcessorSettings::defaults_for(processor))
    }
}

/// One reserved issue with its per-processor slots.
struct Reservation {
    issue: Issue,
    repo: RepoConfig,
    slots: Vec<(ProcessorName, u32)>,
}

// Clone hands each pipeline task its own owned set of adapter handles.
#[derive(Clone)]
pub struct Scheduler<G: GitHubAdapter, W: WorkspaceAdapter, C: Clock> {
    config: SchedulerConfig,
    github: G,
    workspace: W,
    notifier: Notifier,
    prompts: Arc<PromptLoader>,
    store: SharedStateStore,
    clock: C,
}

impl<G: GitHubAdapter, W: WorkspaceAdapter, C: Clock> Scheduler<G, W, C> {
    pub fn new(
        config: SchedulerConfig,
        github: G,
        workspace: W,
        notifier: Notifier,
        prompts: Arc<PromptLoader>,
        store: SharedStateStore,
        clock: C,
    ) -> Self {
        Self { config, github, workspace, notifier, prompts, store, clock }
    }

    /// One full pass: discover, reserve, launch, await every pipeline.
    pub async fn run_tick(&self) -> Result<(), SchedulerError> {
        let candidates = self.discover().await;

        let mut active = self.store.lock().active_issue_numbers();
        let mut remaining = self.config.max_concurrent.saturating_sub(active.len() as u32);
        if remaining == 0 {
            info!(active = active.len(), "at capacity, skipping reservation");
            self.store.lock().save()?;
            return Ok(());
        }

        // Reservation is not interleaved across candidates: each issue is
        // reserved and persisted before the next is considered.
        let mut reservations = Vec::new();
        for issue in candidates {
            if remaining == 0 {
                break;
            }
            // An issue counts once, whichever processor holds it
            if active.contains(&issue.number) {
                continue;
            }
            let Some(repo) = issue.repo_name.as_deref().and_then(|n| self.config.repo(n)) else {
                warn!(issue = issue.number, "discovered issue has no configured repo");
                continue;
            };
            let repo = repo.clone();
            if let Some(reservation) = self.reserve(&issue, &repo)? {
                active.insert(issue.number);
                remaining -= 1;
                reservations.push(reservation);
            }
        }

        // Launch fanout: every (issue, processor) pipeline runs concurrently
        let mut pipelines = JoinSet::new();
        for reservation in reservations {
            for (processor, agent_index) in reservation.slots {
                let scheduler = self.clone();
                let issue = reservation.issue.clone();
                let repo = reservation.repo.clone();
                pipelines.spawn(async move {
                    scheduler.run_pipeline(issue, repo, processor, agent_index).await;
                });
            }
        }
        while let Some(joined) = pipelines.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "pipeline task aborted");
            }
        }
        Ok(())
    }

    async fn discover(&self) -> Vec<Issue> {
        let mut candidates = Vec::new();
        for repo in &self.config.repos {
            match self.github.list_ready_issues(&repo.name).await {
                Ok(issues) => {
                    info!(repo = %repo.name, count = issues.len(), "discovered ready issues");
                    candidates.extend(issues);
                }
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "issue discovery failed, skipping repo");
                }
            }
        }
        candidates
    }

    /// All-or-nothing slot reservation across enabled processors. Returns
    /// None (and commits nothing) when any processor lacks a free slot.
    fn reserve(
        &self,
        issue: &Issue,
        repo: &RepoConfig,
    ) -> Result<Option<Reservation>, SchedulerError> {
        let mut store = self.store.lock();

        let mut slots = Vec::with_capacity(self.config.enabled.len());
        for &processor in &self.config.enabled {
            match store.available_agent_index(processor, self.config.max_concurrent) {
                Some(agent_index) => slots.push((processor, agent_index)),
                None => {
                    warn!(
                        issue = issue.number,
                        processor = %processor,
                        "no free agent slot, deferring issue"
                    );
                    return Ok(None);
                }
            }
        }

        let now = self.clock.now_utc();
        for &(processor, agent_index) in &slots {
            store.set(IssueState::reserved(
                issue.number,
                processor,
                issue_branch(issue.number, processor, now),
                now,
                agent_index,
                issue.repo_name.clone(),
            ));
        }
        store.save()?;
        info!(issue = issue.number, repo = %repo.name, slots = slots.len(), "issue reserved");
        Ok(Some(Reservation {
            issue: issue.clone(),
            repo: repo.clone(),
            slots,
        }))
    }

    /// Per-processor pipeline; any escaping error downgrades to a failed
    /// reconciliation.
    async fn run_pipeline(
        self,
        issue: Issue,
        repo: RepoConfig,
        processor: ProcessorName,
        agent_index: u32,
    ) {
        if let Err(e) = self.pipeline_inner(&issue, &repo, processor, agent_index).await {
            error!(issue = issue.number, processor = %processor, error = %e, "pipeline failed");
            self.reconcile_failure(&issue, &repo, processor).await;
        }
    }

    async fn pipeline_inner(
        &self,
        issue: &Issue,
        repo: &RepoConfig,
        processor: ProcessorName,
        agent_index: u32,
    ) -> Result<(), PipelineError> {
        // Pre-run label swap: the issue leaves the discovery pool and any
        // stale terminal labels from earlier runs are cleared.
        self.github
            .update_labels(
                issue.number,
                &[processor.working_label()],
                &[
                    READY_LABEL.to_string(),
                    processor.completed_label(),
                    processor.failed_label(),
                ],
                &repo.name,
            )
            .await?;

        self.notifier
            .notify_start(
                issue.number,
                &format!("[{}] {}", processor.display_name(), issue.title),
                issue.repo_name.as_deref(),
            )
            .await;

        let driver = ProcessorDriver::new(
            processor,
            self.config.settings(processor),
            self.workspace.clone(),
            Arc::clone(&self.prompts),
            self.notifier.clone(),
            Arc::clone(&self.store),
            self.clock.clone(),
        );
        let outcome = driver.run(issue.number, agent_index, repo).await?;

        // Record the outcome before any label or notification goes out
        let (start_time, last_output) = {
            let mut store = self.store.lock();
            let (start_time, last_output) = match store.get_mut(issue.number, processor) {
                Some(state) => {
                    state.status = outcome.status;
                    state.end_time = Some(self.clock.now_utc());
                    if state.session_id.is_none() {
                        state.session_id = outcome.session_id.clone();
                    }
                    (state.start_time, state.last_output.clone())
                }
                None => {
                    warn!(issue = issue.number, processor = %processor, "state entry vanished mid-run");
                    (self.clock.now_utc(), None)
                }
            };
            store.save()?;
            (start_time, last_output)
        };

        match outcome.status {
            ProcessStatus::Completed => {
                let elapsed = (self.clock.now_utc() - start_time).to_std().unwrap_or_default();
                self.notifier
                    .notify_complete(issue.number, &format_duration(elapsed), issue.repo_name.as_deref())
                    .await;
                self.github
                    .update_labels(
                        issue.number,
                        &[processor.completed_label()],
                        &[processor.working_label()],
                        &repo.name,
                    )
                    .await?;
                let mut store = self.store.lock();
                store.remove(issue.number, processor);
                store.save()?;
            }
            ProcessStatus::NeedsInput => {
                // Entry retained: the slot stays occupied until a human acts
                self.notifier
                    .notify_needs_input(issue.number, last_output.as_deref(), issue.repo_name.as_deref())
                    .await;
            }
            ProcessStatus::Failed => {
                self.github
                    .update_labels(
                        issue.number,
                        &[processor.failed_label()],
                        &[processor.working_label(), READY_LABEL.to_string()],
                        &repo.name,
                    )
                    .await?;
                let mut store = self.store.lock();
                store.remove(issue.number, processor);
                store.save()?;
            }
            ProcessStatus::Pending | ProcessStatus::Running => {
                warn!(issue = issue.number, processor = %processor, status = %outcome.status, "driver returned non-terminal status");
            }
        }
        Ok(())
    }

    /// Catch-all for errors escaping the pipeline: best-effort failed
    /// labels, drop the entry, keep the tick alive.
    async fn reconcile_failure(&self, issue: &Issue, repo: &RepoConfig, processor: ProcessorName) {
        if let Err(e) = self
            .github
            .update_labels(
                issue.number,
                &[processor.failed_label()],
                &[processor.working_label(), READY_LABEL.to_string()],
                &repo.name,
            )
            .await
        {
            warn!(issue = issue.number, error = %e, "failed-label reconciliation did not stick");
        }
        let mut store = self.store.lock();
        store.remove(issue.number, processor);
        if let Err(e) = store.save() {
            error!(issue = issue.number, error = %e, "failed to persist failure cleanup");
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
