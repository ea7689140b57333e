// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process execution: collected short-lived commands and streaming
//! long-lived spawns.
//!
//! The runner never buffers a streaming child's output itself; callers take
//! the raw readers and drain them concurrently, otherwise a full pipe will
//! deadlock the child.

use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("empty command line")]
    EmptyArgv,

    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for {binary}: {source}")]
    Wait {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Collected output of a short-lived command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn options shared by both execution modes.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl RunOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: Some(cwd.into()), envs: Vec::new() }
    }
}

fn build_command(argv: &[String], opts: &RunOptions) -> Result<(Command, String), SpawnError> {
    let (binary, args) = argv.split_first().ok_or(SpawnError::EmptyArgv)?;
    let mut cmd = Command::new(binary);
    cmd.args(args);
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &opts.envs {
        cmd.env(key, value);
    }
    Ok((cmd, binary.clone()))
}

/// Run a short-lived command to completion with both streams captured.
pub async fn run_command(argv: &[String], opts: &RunOptions) -> Result<CommandOutput, SpawnError> {
    let (mut cmd, binary) = build_command(argv, opts)?;
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = cmd
        .output()
        .await
        .map_err(|source| SpawnError::Spawn { binary: binary.clone(), source })?;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// A long-lived child with piped stdio.
#[derive(Debug)]
pub struct SpawnedChild {
    binary: String,
    child: Child,
}

impl SpawnedChild {
    /// Take the stdout reader. Yields raw bytes; line framing is the
    /// caller's concern.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the child to exit and return its exit code. Cancel-safe, so
    /// it can be raced against a timer and re-polled.
    pub async fn wait(&mut self) -> Result<i32, SpawnError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| SpawnError::Wait { binary: self.binary.clone(), source })?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Send the child a kill signal without waiting for it to die. Returns
    /// promptly; the caller still awaits `wait()` to reap.
    pub fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already exited is the common benign case
            tracing::debug!(binary = %self.binary, error = %e, "kill signal not delivered");
        }
    }
}

/// Spawn a long-lived child for streaming supervision.
pub fn spawn_streaming(argv: &[String], opts: &RunOptions) -> Result<SpawnedChild, SpawnError> {
    let (mut cmd, binary) = build_command(argv, opts)?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|source| SpawnError::Spawn { binary: binary.clone(), source })?;
    Ok(SpawnedChild { binary, child })
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
