// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground runner: periodic scheduler ticks under the cross-process lock.
//!
//! SIGINT/SIGTERM request a graceful stop; the in-flight tick is awaited,
//! never cancelled. Running processor children are left to finish or time
//! out: they push branches, and killing them mid-flight can leave the
//! remote half-finished.

use imploid_adapters::github::GitHubAdapter;
use imploid_core::Clock;
use imploid_engine::{Scheduler, WorkspaceAdapter};
use imploid_storage::LockFile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("another imploid instance holds the lock")]
    LockConflict,

    #[error("runner already started")]
    AlreadyRunning,

    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

pub struct ForegroundRunner<G: GitHubAdapter, W: WorkspaceAdapter, C: Clock> {
    scheduler: Scheduler<G, W, C>,
    lock: LockFile,
    interval: Duration,
    stop: CancellationToken,
    running: Arc<AtomicBool>,
}

impl<G: GitHubAdapter, W: WorkspaceAdapter, C: Clock> ForegroundRunner<G, W, C> {
    pub fn new(scheduler: Scheduler<G, W, C>, lock: LockFile) -> Self {
        Self {
            scheduler,
            lock,
            interval: DEFAULT_POLL_INTERVAL,
            stop: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Token that ends the loop; signal handlers cancel it, and so can
    /// embedding code.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Acquire the lock and poll until stopped. One tick runs immediately;
    /// each tick is awaited before the next timer arms. A second call while
    /// the loop is live is an error.
    pub async fn start(&self) -> Result<(), RunnerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RunnerError::AlreadyRunning);
        }
        if !self.lock.acquire() {
            self.running.store(false, Ordering::SeqCst);
            return Err(RunnerError::LockConflict);
        }
        if let Err(e) = self.install_signal_handlers() {
            self.lock.release();
            self.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        info!(interval_secs = self.interval.as_secs_f64(), "foreground runner started");

        loop {
            if let Err(e) = self.scheduler.run_tick().await {
                // A failed save ends the tick; the next tick retries
                error!(error = %e, "scheduler tick failed");
            }
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("foreground runner stopping");
        self.lock.release();
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn install_signal_handlers(&self) -> Result<(), std::io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => warn!("SIGINT received, finishing current tick"),
                _ = sigterm.recv() => warn!("SIGTERM received, finishing current tick"),
            }
            stop.cancel();
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
