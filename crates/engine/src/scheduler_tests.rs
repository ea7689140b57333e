// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::workspace::FakeWorkspace;
use imploid_adapters::{FakeGitHub, FakeSink, Notifier, PromptLoader};
use imploid_core::{AgentEvent, SystemClock};
use imploid_storage::StateStore;
use parking_lot::Mutex;
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

const REPO: &str = "acme/widgets";

fn issue(number: u64, title: &str) -> Issue {
    Issue {
        number,
        title: title.to_string(),
        repo_name: Some(REPO.to_string()),
    }
}

fn running_state(number: u64, processor: ProcessorName, agent_index: u32) -> IssueState {
    IssueState::reserved(
        number,
        processor,
        format!("issue-{}-{}-20260101000000", number, processor),
        chrono::Utc::now(),
        agent_index,
        Some(REPO.to_string()),
    )
}

struct Harness {
    tmp: TempDir,
    github: FakeGitHub,
    sink: FakeSink,
    workspace: FakeWorkspace,
    store: SharedStateStore,
    repo: RepoConfig,
}

impl Harness {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let prompts_dir = tmp.path().join("prompts");
        std::fs::create_dir_all(&prompts_dir).unwrap();
        std::fs::write(prompts_dir.join("claude-default.md"), "Fix ${issueNumber}").unwrap();
        std::fs::write(prompts_dir.join("codex-default.md"), "Fix ${issueNumber}").unwrap();

        let store = Arc::new(Mutex::new(StateStore::new(tmp.path().join("state.json"))));
        let repo = RepoConfig {
            name: REPO.to_string(),
            base_repo_path: tmp.path().join("agents").display().to_string(),
        };
        Harness {
            tmp,
            github: FakeGitHub::new(),
            sink: FakeSink::new(),
            workspace: FakeWorkspace::new(),
            store,
            repo,
        }
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.tmp.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn happy_script(&self) -> String {
        self.script("ok.sh", "echo '{\"session_id\":\"s-run\"}'")
    }

    fn settings(&self, script: &str, timeout: Duration) -> ProcessorSettings {
        ProcessorSettings {
            path: script.to_string(),
            timeout,
            check_interval: Duration::from_millis(20),
            prompt_path: None,
        }
    }

    fn scheduler_config(
        &self,
        max_concurrent: u32,
        enabled: &[ProcessorName],
        script: &str,
        timeout: Duration,
    ) -> SchedulerConfig {
        SchedulerConfig {
            repos: vec![self.repo.clone()],
            max_concurrent,
            enabled: enabled.to_vec(),
            processors: enabled
                .iter()
                .map(|&p| (p, self.settings(script, timeout)))
                .collect(),
        }
    }

    fn scheduler(
        &self,
        config: SchedulerConfig,
    ) -> Scheduler<FakeGitHub, FakeWorkspace, SystemClock> {
        let mut notifier = Notifier::new();
        notifier.push(Arc::new(self.sink.clone()));
        Scheduler::new(
            config,
            self.github.clone(),
            self.workspace.clone(),
            notifier,
            Arc::new(PromptLoader::new(
                self.tmp.path().join("overrides"),
                self.tmp.path().join("prompts"),
            )),
            Arc::clone(&self.store),
            SystemClock,
        )
    }

    fn simple_scheduler(
        &self,
        max_concurrent: u32,
        enabled: &[ProcessorName],
        script: &str,
    ) -> Scheduler<FakeGitHub, FakeWorkspace, SystemClock> {
        self.scheduler(self.scheduler_config(max_concurrent, enabled, script, Duration::from_secs(5)))
    }
}

#[tokio::test]
async fn happy_path_single_issue_single_processor() {
    let h = Harness::new();
    h.github.put_issues(REPO, vec![issue(42, "Add feature")]);
    h.github.put_labels(REPO, 42, &["agent-ready"]);

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    // agent-ready → claude-working → claude-completed
    assert_eq!(h.github.labels(REPO, 42), vec!["claude-completed".to_string()]);
    let calls = h.github.label_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].add, vec!["claude-working".to_string()]);
    assert!(calls[0].remove.contains(&"agent-ready".to_string()));
    assert_eq!(calls[1].add, vec!["claude-completed".to_string()]);
    assert_eq!(calls[1].remove, vec!["claude-working".to_string()]);
    // claude-failed never added
    assert!(calls.iter().all(|c| !c.add.contains(&"claude-failed".to_string())));

    // notify_start then notify_complete with a short duration
    let events = h.sink.events();
    assert_eq!(events.len(), 2);
    match &events[0] {
        AgentEvent::Started { issue, title, repo } => {
            assert_eq!(*issue, 42);
            assert_eq!(title, "[Claude] Add feature");
            assert_eq!(repo.as_deref(), Some(REPO));
        }
        other => panic!("expected Started, got {other:?}"),
    }
    match &events[1] {
        AgentEvent::Completed { issue, duration, .. } => {
            assert_eq!(*issue, 42);
            assert!(duration.starts_with("0m "), "duration was {duration}");
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    // Entry deleted after reconciliation
    assert!(h.store.lock().is_empty());
}

#[tokio::test]
async fn fan_out_across_processors() {
    let h = Harness::new();
    h.github.put_issues(REPO, vec![issue(303, "Refactor")]);
    h.github.put_labels(REPO, 303, &["agent-ready"]);

    let script = h.happy_script();
    let scheduler =
        h.simple_scheduler(2, &[ProcessorName::Claude, ProcessorName::Codex], &script);
    scheduler.run_tick().await.unwrap();

    // One reservation, two pipelines, two distinct branches
    let branches: Vec<String> =
        h.workspace.prepared_branches().into_iter().map(|(_, b)| b).collect();
    assert_eq!(branches.len(), 2);
    assert!(branches.iter().any(|b| b.starts_with("issue-303-claude-")));
    assert!(branches.iter().any(|b| b.starts_with("issue-303-codex-")));
    for branch in &branches {
        let ts = branch.rsplit('-').next().unwrap();
        assert_eq!(ts.len(), 14);
    }

    // Both reconciled to completed and deleted
    assert!(h.store.lock().is_empty());
    let final_labels = h.github.labels(REPO, 303);
    assert!(final_labels.contains(&"claude-completed".to_string()));
    assert!(final_labels.contains(&"codex-completed".to_string()));
    assert!(!final_labels.contains(&"agent-ready".to_string()));

    // Each processor worked in its own slot directory
    let calls = h.workspace.ensure_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&(ProcessorName::Claude, 0, REPO.to_string())));
    assert!(calls.contains(&(ProcessorName::Codex, 0, REPO.to_string())));
}

#[tokio::test]
async fn timeout_reconciles_to_failed() {
    let h = Harness::new();
    h.github.put_issues(REPO, vec![issue(7, "Stuck")]);
    h.github.put_labels(REPO, 7, &["agent-ready"]);

    let script = h.script("stuck.sh", "echo '{\"session_id\":\"t-7\"}'\nsleep 60");
    let config = h.scheduler_config(
        2,
        &[ProcessorName::Claude],
        &script,
        Duration::from_secs_f64(0.2),
    );
    let scheduler = h.scheduler(config);
    scheduler.run_tick().await.unwrap();

    assert_eq!(h.github.labels(REPO, 7), vec!["claude-failed".to_string()]);
    assert!(h.store.lock().is_empty());

    let errors: Vec<String> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::Errored { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].contains("Process timed out after 0.2 seconds"),
        "got: {}",
        errors[0]
    );
}

#[tokio::test]
async fn capacity_saturation_reserves_nothing() {
    let h = Harness::new();
    h.store.lock().set(running_state(5, ProcessorName::Claude, 0));
    h.github.put_issues(REPO, vec![issue(6, "Six"), issue(7, "Seven")]);

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(1, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    assert!(h.github.label_calls().is_empty());
    assert!(h.workspace.ensure_calls().is_empty());
    assert!(h.sink.events().is_empty());
    let store = h.store.lock();
    assert_eq!(store.len(), 1);
    assert!(store.get(5, ProcessorName::Claude).is_some());
}

#[tokio::test]
async fn partial_slot_availability_commits_nothing() {
    let h = Harness::new();
    // claude's only slot is taken; codex is free. Nothing may be committed
    // for #6 on either processor.
    h.store.lock().set(running_state(5, ProcessorName::Claude, 0));
    h.github.put_issues(REPO, vec![issue(6, "Six")]);

    let script = h.happy_script();
    let scheduler =
        h.simple_scheduler(1, &[ProcessorName::Claude, ProcessorName::Codex], &script);
    scheduler.run_tick().await.unwrap();

    assert!(h.github.label_calls().is_empty());
    assert!(h.sink.events().is_empty());
    let store = h.store.lock();
    assert_eq!(store.len(), 1);
    assert!(store.get(6, ProcessorName::Claude).is_none());
    assert!(store.get(6, ProcessorName::Codex).is_none());
}

#[tokio::test]
async fn reservation_is_all_or_nothing_across_processors() {
    let h = Harness::new();
    h.store.lock().set(running_state(5, ProcessorName::Claude, 0));

    let script = h.happy_script();
    let scheduler =
        h.simple_scheduler(1, &[ProcessorName::Claude, ProcessorName::Codex], &script);

    // Exercise the reservation step directly: claude cannot yield a slot,
    // so the issue aborts with no partial codex entry.
    let reservation = scheduler.reserve(&issue(6, "Six"), &h.repo).unwrap();
    assert!(reservation.is_none());
    let store = h.store.lock();
    assert_eq!(store.len(), 1);
    assert!(store.get(6, ProcessorName::Codex).is_none());
}

#[tokio::test]
async fn crash_recovery_skips_active_issue_and_takes_the_next() {
    let h = Harness::new();
    // Persist a pre-crash state file and reload it, as startup would
    {
        let mut store = StateStore::new(h.tmp.path().join("state.json"));
        store.set(running_state(10, ProcessorName::Claude, 0));
        store.save().unwrap();
    }
    *h.store.lock() = StateStore::load(h.tmp.path().join("state.json"));

    h.github.put_issues(REPO, vec![issue(10, "Old"), issue(11, "New")]);
    h.github.put_labels(REPO, 11, &["agent-ready"]);

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    // #10 was filtered (already active), #11 reserved into the next slot
    let ensure_calls = h.workspace.ensure_calls();
    assert_eq!(ensure_calls, vec![(ProcessorName::Claude, 1, REPO.to_string())]);

    let store = h.store.lock();
    assert!(store.get(10, ProcessorName::Claude).is_some(), "crashed entry must survive");
    assert!(store.get(11, ProcessorName::Claude).is_none(), "completed entry must be deleted");

    let branches: Vec<String> =
        h.workspace.prepared_branches().into_iter().map(|(_, b)| b).collect();
    assert!(branches.iter().all(|b| b.starts_with("issue-11-")));
}

#[tokio::test]
async fn discovery_errors_skip_the_repo_but_not_the_tick() {
    let h = Harness::new();
    let other = RepoConfig {
        name: "acme/other".to_string(),
        base_repo_path: h.repo.base_repo_path.clone(),
    };
    h.github.fail_repo("acme/other");
    h.github.put_issues(REPO, vec![issue(42, "Add feature")]);

    let script = h.happy_script();
    let mut config =
        h.scheduler_config(2, &[ProcessorName::Claude], &script, Duration::from_secs(5));
    config.repos.insert(0, other);
    let scheduler = h.scheduler(config);
    scheduler.run_tick().await.unwrap();

    // The healthy repo's issue completed despite the failing repo
    assert!(h.store.lock().is_empty());
    assert_eq!(h.github.labels(REPO, 42), vec!["claude-completed".to_string()]);
}

#[tokio::test]
async fn failed_child_reconciles_labels_and_removes_state() {
    let h = Harness::new();
    h.github.put_issues(REPO, vec![issue(8, "Bad")]);
    h.github.put_labels(REPO, 8, &["agent-ready"]);

    let script = h.script("fail.sh", "echo 'kaboom' >&2\nexit 2");
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    // Failure always lands claude-failed and clears working + agent-ready
    assert_eq!(h.github.labels(REPO, 8), vec!["claude-failed".to_string()]);
    assert!(h.store.lock().is_empty());

    let errors: Vec<String> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::Errored { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("kaboom"));
}

#[tokio::test]
async fn workspace_failure_is_local_to_the_pipeline() {
    let h = Harness::new();
    h.workspace.fail_ensure();
    h.github.put_issues(REPO, vec![issue(9, "Unreachable")]);
    h.github.put_labels(REPO, 9, &["agent-ready"]);

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    // Catch-all reconciliation: failed label applied, entry dropped
    assert!(h.github.labels(REPO, 9).contains(&"claude-failed".to_string()));
    assert!(h.store.lock().is_empty());
}

#[tokio::test]
async fn second_tick_with_no_new_issues_changes_nothing() {
    let h = Harness::new();
    h.github.put_issues(REPO, vec![issue(42, "Add feature")]);
    h.github.put_labels(REPO, 42, &["agent-ready"]);

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    // The label swap already pulled the issue out of the discovery pool
    h.github.put_issues(REPO, vec![]);
    let calls_after_first = h.github.label_calls().len();
    let events_after_first = h.sink.events().len();

    scheduler.run_tick().await.unwrap();
    assert_eq!(h.github.label_calls().len(), calls_after_first);
    assert_eq!(h.sink.events().len(), events_after_first);
    assert!(h.store.lock().is_empty());
}

#[tokio::test]
async fn issue_without_configured_repo_is_skipped() {
    let h = Harness::new();
    h.github.put_issues(
        REPO,
        vec![Issue {
            number: 50,
            title: "Orphan".to_string(),
            repo_name: Some("unconfigured/elsewhere".to_string()),
        }],
    );

    let script = h.happy_script();
    let scheduler = h.simple_scheduler(2, &[ProcessorName::Claude], &script);
    scheduler.run_tick().await.unwrap();

    assert!(h.store.lock().is_empty());
    assert!(h.github.label_calls().is_empty());
}

#[test]
fn enabled_override_intersects_with_configured() {
    let config: Config = serde_json::from_value(json!({
        "github": {
            "token": "t",
            "repos": [{"name": "a/b", "base_repo_path": "/x"}]
        },
        "processors": {"enabled": ["claude", "codex"]}
    }))
    .unwrap();

    let narrowed = SchedulerConfig::from_config(&config, Some(&[ProcessorName::Codex]));
    assert_eq!(narrowed.enabled, vec![ProcessorName::Codex]);

    // Requesting a processor that is not configured-enabled yields nothing
    let config_claude_only: Config = serde_json::from_value(json!({
        "github": {
            "token": "t",
            "repos": [{"name": "a/b", "base_repo_path": "/x"}]
        }
    }))
    .unwrap();
    let empty = SchedulerConfig::from_config(&config_claude_only, Some(&[ProcessorName::Codex]));
    assert!(empty.enabled.is_empty());

    let unchanged = SchedulerConfig::from_config(&config, None);
    assert_eq!(unchanged.enabled, vec![ProcessorName::Claude, ProcessorName::Codex]);
}
