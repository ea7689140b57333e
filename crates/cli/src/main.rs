// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! imploid: dispatch `agent-ready` GitHub issues to autonomous coding agents.

mod exit_error;
mod setup;

use clap::Parser;
use exit_error::ExitError;
use imploid_adapters::{GitHubClient, Notifier, PromptLoader};
use imploid_core::{config_dir, Config, ProcessorName, SystemClock};
use imploid_daemon::{ForegroundRunner, RunnerError};
use imploid_engine::{GitWorkspace, Scheduler, SchedulerConfig};
use imploid_storage::{LockFile, StateStore};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "imploid",
    version,
    about = "Dispatch agent-ready GitHub issues to autonomous coding agents"
)]
struct Cli {
    /// Launch the companion configuration wizard, then exit
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    config: Option<Option<String>>,

    /// Install the command templates via the companion setup tool, then exit
    #[arg(long)]
    install_commands: bool,

    /// Poll continuously instead of running a single scheduling tick
    #[arg(long)]
    foreground: bool,

    /// Processors for this run, intersected with the configured set
    #[arg(long, value_delimiter = ',', value_name = "NAME[,NAME]")]
    processors: Option<Vec<String>>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        if !e.message.is_empty() {
            eprintln!("{}", e.message);
        }
        std::process::exit(e.code);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    if let Some(config_arg) = cli.config {
        return ExitError::check_status(setup::run_wizard(config_arg.as_deref()));
    }
    if cli.install_commands {
        return ExitError::check_status(setup::install_commands());
    }

    let enabled_override = parse_processors(cli.processors.as_deref())?;

    let config_path = Config::default_path();
    let config = Config::load(&config_path).map_err(|e| ExitError::new(1, e.to_string()))?;
    tracing::info!(path = %config_path.display(), "configuration loaded");
    let scheduler_config = SchedulerConfig::from_config(&config, enabled_override.as_deref());
    if scheduler_config.enabled.is_empty() {
        return Err(ExitError::new(1, "no processors enabled for this run"));
    }

    let dir = config_dir();
    let lock = LockFile::new(dir.join("imploid.lock"));
    let store = Arc::new(Mutex::new(StateStore::load(dir.join("processing-state.json"))));
    let prompts = Arc::new(PromptLoader::new(dir.join("prompts"), installed_prompts_dir()));
    let scheduler = Scheduler::new(
        scheduler_config,
        GitHubClient::new(&config.github.token),
        GitWorkspace::new(),
        Notifier::from_config(&config),
        prompts,
        store,
        SystemClock,
    );

    if cli.foreground {
        let runner = ForegroundRunner::new(scheduler, lock);
        runner.start().await.map_err(|e| match e {
            RunnerError::LockConflict => ExitError::new(1, e.to_string()),
            other => ExitError::new(1, other.to_string()),
        })
    } else {
        // A single tick also holds the lock so it cannot race a foreground
        // instance on the same state file
        if !lock.acquire() {
            return Err(ExitError::new(1, "another imploid instance holds the lock"));
        }
        let result = scheduler.run_tick().await;
        lock.release();
        result.map_err(|e| ExitError::new(1, e.to_string()))
    }
}

fn parse_processors(names: Option<&[String]>) -> Result<Option<Vec<ProcessorName>>, ExitError> {
    let Some(names) = names else { return Ok(None) };
    let mut parsed = Vec::with_capacity(names.len());
    for name in names {
        let processor = name
            .trim()
            .parse::<ProcessorName>()
            .map_err(|e| ExitError::new(1, e.to_string()))?;
        if !parsed.contains(&processor) {
            parsed.push(processor);
        }
    }
    Ok(Some(parsed))
}

/// Default prompt templates ship next to the installed binary.
fn installed_prompts_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("prompts")))
        .unwrap_or_else(|| PathBuf::from("prompts"))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
