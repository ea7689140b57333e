// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-slot git working copies.
//!
//! Every (processor, agent_index, repo) triple owns the directory
//! `<base_repo_path>/<processor>/<short_repo>_agent_<index>`, exclusively
//! while that slot is active. Operations go through the git CLI.

use async_trait::async_trait;
use imploid_adapters::subprocess::{run_command, CommandOutput, RunOptions, SpawnError};
use imploid_core::{ProcessorName, RepoConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {step} failed: {stderr}")]
    Command { step: String, stderr: String },

    #[error("worktree at {path} is dirty after {step}")]
    Dirty { path: PathBuf, step: String },

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow interface so the driver and scheduler can run against a fake.
#[async_trait]
pub trait WorkspaceAdapter: Clone + Send + Sync + 'static {
    /// Clone the repository into the slot directory, or refresh an existing
    /// clone back to a clean default branch. Returns the directory.
    async fn ensure_clone(
        &self,
        processor: ProcessorName,
        agent_index: u32,
        repo: &RepoConfig,
    ) -> Result<PathBuf, GitError>;

    /// Check out the default branch and hard-reset it clean. Returns the
    /// branch name.
    async fn prepare_default_branch(&self, path: &Path) -> Result<String, GitError>;

    /// From a freshly-reset default branch, `git checkout -B <branch>`.
    /// Postcondition: current branch is `branch` and the worktree is clean.
    async fn prepare_issue_branch(&self, path: &Path, branch: &str) -> Result<(), GitError>;
}

/// Slot directory for one (processor, agent_index, repo) triple.
pub fn workspace_dir(repo: &RepoConfig, processor: ProcessorName, agent_index: u32) -> PathBuf {
    repo.base_path()
        .join(processor.as_str())
        .join(format!("{}_agent_{}", repo.short_name(), agent_index))
}

/// SSH clone URL for a canonical `owner/name`.
pub fn clone_url(repo_name: &str) -> String {
    format!("git@github.com:{}.git", repo_name)
}

/// Git CLI implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct GitWorkspace;

impl GitWorkspace {
    pub fn new() -> Self {
        Self
    }
}

async fn git(dir: &Path, args: &[&str], step: &str) -> Result<CommandOutput, GitError> {
    let mut argv = vec!["git".to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    let output = run_command(&argv, &RunOptions::in_dir(dir)).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(GitError::Command {
            step: step.to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Check out `main`, falling back to `master`.
async fn checkout_default(dir: &Path) -> Result<String, GitError> {
    match git(dir, &["checkout", "main"], "checkout main").await {
        Ok(_) => Ok("main".to_string()),
        Err(_) => {
            git(dir, &["checkout", "master"], "checkout master").await?;
            Ok("master".to_string())
        }
    }
}

async fn is_dirty(dir: &Path) -> Result<bool, GitError> {
    let status = git(dir, &["status", "--porcelain"], "status").await?;
    Ok(!status.stdout.trim().is_empty())
}

async fn force_clean(dir: &Path) -> Result<(), GitError> {
    git(dir, &["reset", "--hard"], "reset").await?;
    git(dir, &["clean", "-fd"], "clean").await?;
    Ok(())
}

/// Best-effort `./setup.sh` after a refresh; a failing hook is a warning.
async fn run_setup_script(dir: &Path) {
    let script = dir.join("setup.sh");
    if !script.exists() {
        return;
    }
    let chmod = ["chmod".to_string(), "+x".to_string(), "setup.sh".to_string()];
    let _ = run_command(&chmod, &RunOptions::in_dir(dir)).await;
    match run_command(&[script.display().to_string()], &RunOptions::in_dir(dir)).await {
        Ok(output) if !output.success() => {
            warn!(dir = %dir.display(), code = output.exit_code, stderr = %output.stderr.trim(), "setup.sh failed");
        }
        Err(e) => warn!(dir = %dir.display(), error = %e, "setup.sh could not be run"),
        Ok(_) => {}
    }
}

#[async_trait]
impl WorkspaceAdapter for GitWorkspace {
    async fn ensure_clone(
        &self,
        processor: ProcessorName,
        agent_index: u32,
        repo: &RepoConfig,
    ) -> Result<PathBuf, GitError> {
        let dir = workspace_dir(repo, processor, agent_index);

        if !dir.exists() {
            if let Some(parent) = dir.parent() {
                std::fs::create_dir_all(parent)?;
            }
            debug!(repo = %repo.name, dir = %dir.display(), "cloning");
            let argv = [
                "git".to_string(),
                "clone".to_string(),
                clone_url(&repo.name),
                dir.display().to_string(),
            ];
            let output = run_command(&argv, &RunOptions::default()).await?;
            if !output.success() {
                return Err(GitError::Command {
                    step: "clone".to_string(),
                    stderr: output.stderr.trim().to_string(),
                });
            }
        } else {
            let branch = checkout_default(&dir).await?;
            git(&dir, &["fetch", "origin"], "fetch").await?;
            git(&dir, &["pull", "origin", &branch], "pull").await?;
        }

        if is_dirty(&dir).await? {
            force_clean(&dir).await?;
        }
        run_setup_script(&dir).await;
        Ok(dir)
    }

    async fn prepare_default_branch(&self, path: &Path) -> Result<String, GitError> {
        let branch = checkout_default(path).await?;
        let origin_ref = format!("origin/{}", branch);
        // No remote-tracking ref (local-only repo): fall back to plain reset
        if git(path, &["reset", "--hard", &origin_ref], "reset").await.is_err() {
            git(path, &["reset", "--hard"], "reset").await?;
        }
        git(path, &["clean", "-fd"], "clean").await?;
        Ok(branch)
    }

    async fn prepare_issue_branch(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        self.prepare_default_branch(path).await?;
        git(path, &["checkout", "-B", branch], "checkout branch").await?;
        if is_dirty(path).await? {
            return Err(GitError::Dirty {
                path: path.to_path_buf(),
                step: "checkout branch".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{workspace_dir, GitError, WorkspaceAdapter};
    use async_trait::async_trait;
    use imploid_core::{ProcessorName, RepoConfig};
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeWorkspaceState {
        ensure_calls: Vec<(ProcessorName, u32, String)>,
        prepared_branches: Vec<(PathBuf, String)>,
        fail_ensure: bool,
    }

    /// Workspace fake: creates real (empty) slot directories so children
    /// have a cwd, without touching git.
    #[derive(Clone, Default)]
    pub struct FakeWorkspace {
        inner: Arc<Mutex<FakeWorkspaceState>>,
    }

    impl FakeWorkspace {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_ensure(&self) {
            self.inner.lock().fail_ensure = true;
        }

        pub fn ensure_calls(&self) -> Vec<(ProcessorName, u32, String)> {
            self.inner.lock().ensure_calls.clone()
        }

        pub fn prepared_branches(&self) -> Vec<(PathBuf, String)> {
            self.inner.lock().prepared_branches.clone()
        }
    }

    #[async_trait]
    impl WorkspaceAdapter for FakeWorkspace {
        async fn ensure_clone(
            &self,
            processor: ProcessorName,
            agent_index: u32,
            repo: &RepoConfig,
        ) -> Result<PathBuf, GitError> {
            if self.inner.lock().fail_ensure {
                return Err(GitError::Command {
                    step: "clone".to_string(),
                    stderr: "scripted failure".to_string(),
                });
            }
            let dir = workspace_dir(repo, processor, agent_index);
            std::fs::create_dir_all(&dir)?;
            self.inner
                .lock()
                .ensure_calls
                .push((processor, agent_index, repo.name.clone()));
            Ok(dir)
        }

        async fn prepare_default_branch(&self, _path: &Path) -> Result<String, GitError> {
            Ok("main".to_string())
        }

        async fn prepare_issue_branch(&self, path: &Path, branch: &str) -> Result<(), GitError> {
            self.inner
                .lock()
                .prepared_branches
                .push((path.to_path_buf(), branch.to_string()));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeWorkspace;

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
