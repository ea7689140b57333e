// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable map of (issue, processor) → IssueState.
//!
//! Serialized as a single JSON object whose keys are `"<issue>:<processor>"`.
//! Legacy keys that are bare integers are accepted on read and interpreted
//! as processor `claude`. The store is single-writer within a process;
//! callers serialize load/modify/save triples behind a mutex.

use imploid_core::{IssueState, ProcessorName};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Store handle shared across pipeline tasks. The mutex covers every
/// load/modify/save triple.
pub type SharedStateStore = Arc<Mutex<StateStore>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write state to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Composite primary key of the state map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub issue: u64,
    pub processor: ProcessorName,
}

impl StateKey {
    pub fn new(issue: u64, processor: ProcessorName) -> Self {
        Self { issue, processor }
    }

    /// Parse a serialized key. Bare integers are the legacy form and map to
    /// processor `claude`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some((issue, processor)) => Some(Self {
                issue: issue.parse().ok()?,
                processor: processor.parse().ok()?,
            }),
            None => Some(Self {
                issue: raw.parse().ok()?,
                processor: ProcessorName::default(),
            }),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.issue, self.processor)
    }
}

/// In-memory state map backed by a JSON file.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    states: HashMap<StateKey, IssueState>,
}

impl StateStore {
    /// Empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), states: HashMap::new() }
    }

    /// Read the file at `path` if present. A missing file is benign; corrupt
    /// entries are skipped with a warning; a wholly unreadable file falls
    /// back to an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self { path: path.clone(), states: HashMap::new() };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file, starting empty");
                return store;
            }
        };

        let raw: HashMap<String, serde_json::Value> = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file is not valid JSON, starting empty");
                return store;
            }
        };

        for (raw_key, value) in raw {
            let Some(key) = StateKey::parse(&raw_key) else {
                warn!(key = %raw_key, "skipping state entry with unparseable key");
                continue;
            };
            match serde_json::from_value::<IssueState>(value) {
                Ok(mut state) => {
                    state.issue_number = key.issue;
                    state.processor_name = key.processor;
                    store.states.insert(key, state);
                }
                Err(e) => {
                    warn!(key = %raw_key, error = %e, "skipping corrupt state entry");
                }
            }
        }
        store
    }

    pub fn get(&self, issue: u64, processor: ProcessorName) -> Option<&IssueState> {
        self.states.get(&StateKey::new(issue, processor))
    }

    pub fn get_mut(&mut self, issue: u64, processor: ProcessorName) -> Option<&mut IssueState> {
        self.states.get_mut(&StateKey::new(issue, processor))
    }

    /// Insert or replace; the key derives from the record's identity fields.
    pub fn set(&mut self, state: IssueState) {
        let key = StateKey::new(state.issue_number, state.processor_name);
        self.states.insert(key, state);
    }

    pub fn remove(&mut self, issue: u64, processor: ProcessorName) -> Option<IssueState> {
        self.states.remove(&StateKey::new(issue, processor))
    }

    /// Write the full map to `<path>.tmp` and rename into place. Parent
    /// directories are created as needed.
    pub fn save(&self) -> Result<(), StorageError> {
        // BTreeMap keeps key order stable across saves
        let ordered: BTreeMap<String, &IssueState> =
            self.states.iter().map(|(k, v)| (k.to_string(), v)).collect();
        let body = serde_json::to_string_pretty(&ordered)?;

        let write_err = |source: std::io::Error| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    /// All states with an active status (`running` or `needs_input`).
    pub fn active_states(&self) -> Vec<&IssueState> {
        self.states.values().filter(|s| s.is_active()).collect()
    }

    pub fn active_states_by_processor(&self, processor: ProcessorName) -> Vec<&IssueState> {
        self.states
            .values()
            .filter(|s| s.processor_name == processor && s.is_active())
            .collect()
    }

    /// Issue numbers with any active state, union across processors.
    pub fn active_issue_numbers(&self) -> BTreeSet<u64> {
        self.states.values().filter(|s| s.is_active()).map(|s| s.issue_number).collect()
    }

    pub fn active_issue_numbers_by_processor(&self, processor: ProcessorName) -> BTreeSet<u64> {
        self.states
            .values()
            .filter(|s| s.processor_name == processor && s.is_active())
            .map(|s| s.issue_number)
            .collect()
    }

    /// Smallest index in `[0, max_concurrent)` not occupied by an active
    /// state of `processor`.
    pub fn available_agent_index(
        &self,
        processor: ProcessorName,
        max_concurrent: u32,
    ) -> Option<u32> {
        let taken: BTreeSet<u32> = self
            .active_states_by_processor(processor)
            .iter()
            .map(|s| s.agent_index)
            .collect();
        (0..max_concurrent).find(|i| !taken.contains(i))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate all entries (test and inspection use).
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &IssueState)> {
        self.states.iter()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
