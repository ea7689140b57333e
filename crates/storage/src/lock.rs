// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory cross-process single-writer lock.
//!
//! Persisted as a JSON file `{pid, startTime}` under the config directory.
//! Unlike a kernel flock, the PID record is readable by companion tools, so
//! liveness is probed with signal 0 rather than held file descriptors.

use chrono::{DateTime, Utc};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: i32,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
}

/// PID-file lock manager.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock. Returns false when another live process holds
    /// it or the filesystem refuses the write. A stale holder (dead PID or
    /// unreadable file) is deleted and the write retried once.
    pub fn acquire(&self) -> bool {
        if self.path.exists() {
            match self.current_holder() {
                Some(holder) if pid_alive(holder.pid) => {
                    debug!(pid = holder.pid, "lock held by live process");
                    return false;
                }
                Some(holder) => {
                    warn!(pid = holder.pid, "removing stale lock from dead process");
                    if std::fs::remove_file(&self.path).is_err() {
                        return false;
                    }
                }
                None => {
                    warn!(path = %self.path.display(), "removing unreadable lock file");
                    if std::fs::remove_file(&self.path).is_err() {
                        return false;
                    }
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id() as i32,
            start_time: Utc::now(),
        };
        self.write(&info).is_ok()
    }

    /// Delete the lock iff it records our PID. A missing file is not an
    /// error; someone else's lock is left alone.
    pub fn release(&self) {
        match self.current_holder() {
            Some(holder) if holder.pid == std::process::id() as i32 => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    warn!(error = %e, "failed to remove lock file");
                }
            }
            Some(holder) => {
                warn!(pid = holder.pid, "not releasing lock owned by another process");
            }
            None => {}
        }
    }

    /// Read the current lock contents, if any.
    pub fn current_holder(&self) -> Option<LockInfo> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn write(&self, info: &LockInfo) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(info)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        // Temp + rename so concurrent readers never see a partial file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// Probe process existence without disturbing it (signal 0).
fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
