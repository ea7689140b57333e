// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub REST adapter: issue discovery, label reconciliation, comments.
//!
//! Labels and comments are advisory mirrors of local state; every mutation
//! here must be safe to re-invoke with the same arguments.

use async_trait::async_trait;
use imploid_core::{Issue, READY_LABEL};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("github api returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("github request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl GitHubError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Narrow interface over the GitHub issues API.
#[async_trait]
pub trait GitHubAdapter: Clone + Send + Sync + 'static {
    /// Open issues carrying the discovery label, annotated with `repo`.
    async fn list_ready_issues(&self, repo: &str) -> Result<Vec<Issue>, GitHubError>;

    /// Read-modify-write the issue's label set: removals applied first,
    /// then additions. Idempotent.
    async fn update_labels(
        &self,
        issue: u64,
        add: &[String],
        remove: &[String],
        repo: &str,
    ) -> Result<(), GitHubError>;

    async fn create_comment(&self, issue: u64, body: &str, repo: &str)
        -> Result<(), GitHubError>;
}

/// Set arithmetic behind `update_labels`: survivors keep their order,
/// additions append, duplicates collapse.
pub fn apply_label_changes(current: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let mut result: Vec<String> = current
        .iter()
        .filter(|label| !remove.contains(label))
        .cloned()
        .collect();
    for label in add {
        if !result.contains(label) {
            result.push(label.clone());
        }
    }
    result
}

const API_BASE: &str = "https://api.github.com";

/// HTTP implementation over reqwest.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    /// Present when the "issue" is actually a pull request
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base(token, API_BASE)
    }

    /// Point the client at a different API root (test servers).
    pub fn with_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            api_base: api_base.into(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "imploid")
    }

    async fn check(
        &self,
        response: reqwest::Response,
        url: &str,
    ) -> Result<reqwest::Response, GitHubError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(GitHubError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            })
        }
    }

    async fn current_labels(&self, issue: u64, repo: &str) -> Result<Vec<String>, GitHubError> {
        let url = format!("{}/repos/{}/issues/{}/labels", self.api_base, repo, issue);
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let labels: Vec<RawLabel> = self.check(response, &url).await?.json().await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }
}

#[async_trait]
impl GitHubAdapter for GitHubClient {
    async fn list_ready_issues(&self, repo: &str) -> Result<Vec<Issue>, GitHubError> {
        let url = format!(
            "{}/repos/{}/issues?labels={}&state=open",
            self.api_base, repo, READY_LABEL
        );
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let raw: Vec<RawIssue> = self.check(response, &url).await?.json().await?;

        Ok(raw
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| Issue {
                number: issue.number,
                title: issue.title,
                repo_name: Some(repo.to_string()),
            })
            .collect())
    }

    async fn update_labels(
        &self,
        issue: u64,
        add: &[String],
        remove: &[String],
        repo: &str,
    ) -> Result<(), GitHubError> {
        let current = self.current_labels(issue, repo).await?;
        let desired = apply_label_changes(&current, add, remove);

        let url = format!("{}/repos/{}/issues/{}/labels", self.api_base, repo, issue);
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&json!({ "labels": desired }))
            .send()
            .await?;
        self.check(response, &url).await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        issue: u64,
        body: &str,
        repo: &str,
    ) -> Result<(), GitHubError> {
        let url = format!("{}/repos/{}/issues/{}/comments", self.api_base, repo, issue);
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        self.check(response, &url).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{apply_label_changes, GitHubAdapter, GitHubError};
    use async_trait::async_trait;
    use imploid_core::Issue;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    /// One recorded `update_labels` invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LabelChange {
        pub repo: String,
        pub issue: u64,
        pub add: Vec<String>,
        pub remove: Vec<String>,
    }

    #[derive(Default)]
    struct FakeGitHubState {
        issues: HashMap<String, Vec<Issue>>,
        labels: HashMap<(String, u64), Vec<String>>,
        comments: Vec<(String, u64, String)>,
        label_calls: Vec<LabelChange>,
        list_calls: usize,
        failing_repos: HashSet<String>,
    }

    /// In-memory GitHub for tests: scripted issue lists, real label set
    /// arithmetic, recorded mutations.
    #[derive(Clone, Default)]
    pub struct FakeGitHub {
        inner: Arc<Mutex<FakeGitHubState>>,
    }

    impl FakeGitHub {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the issues a repo returns from discovery.
        pub fn put_issues(&self, repo: &str, issues: Vec<Issue>) {
            self.inner.lock().issues.insert(repo.to_string(), issues);
        }

        /// Seed an issue's label set.
        pub fn put_labels(&self, repo: &str, issue: u64, labels: &[&str]) {
            self.inner
                .lock()
                .labels
                .insert((repo.to_string(), issue), labels.iter().map(|s| s.to_string()).collect());
        }

        /// Make discovery fail for one repo.
        pub fn fail_repo(&self, repo: &str) {
            self.inner.lock().failing_repos.insert(repo.to_string());
        }

        pub fn labels(&self, repo: &str, issue: u64) -> Vec<String> {
            self.inner
                .lock()
                .labels
                .get(&(repo.to_string(), issue))
                .cloned()
                .unwrap_or_default()
        }

        pub fn label_calls(&self) -> Vec<LabelChange> {
            self.inner.lock().label_calls.clone()
        }

        pub fn comments(&self) -> Vec<(String, u64, String)> {
            self.inner.lock().comments.clone()
        }

        /// How many times discovery ran, across all repos.
        pub fn list_calls(&self) -> usize {
            self.inner.lock().list_calls
        }
    }

    #[async_trait]
    impl GitHubAdapter for FakeGitHub {
        async fn list_ready_issues(&self, repo: &str) -> Result<Vec<Issue>, GitHubError> {
            let mut inner = self.inner.lock();
            inner.list_calls += 1;
            if inner.failing_repos.contains(repo) {
                return Err(GitHubError::Status { status: 500, url: repo.to_string() });
            }
            Ok(inner.issues.get(repo).cloned().unwrap_or_default())
        }

        async fn update_labels(
            &self,
            issue: u64,
            add: &[String],
            remove: &[String],
            repo: &str,
        ) -> Result<(), GitHubError> {
            let mut inner = self.inner.lock();
            let key = (repo.to_string(), issue);
            let current = inner.labels.get(&key).cloned().unwrap_or_default();
            let desired = apply_label_changes(&current, add, remove);
            inner.labels.insert(key, desired);
            inner.label_calls.push(LabelChange {
                repo: repo.to_string(),
                issue,
                add: add.to_vec(),
                remove: remove.to_vec(),
            });
            Ok(())
        }

        async fn create_comment(
            &self,
            issue: u64,
            body: &str,
            repo: &str,
        ) -> Result<(), GitHubError> {
            self.inner.lock().comments.push((repo.to_string(), issue, body.to_string()));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGitHub, LabelChange};

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
