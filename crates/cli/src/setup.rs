// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegation to the companion `imploid-setup` executable.
//!
//! The interactive configuration wizard and the command-template installer
//! live outside the orchestrator; both are reached through this seam and
//! their exit codes pass straight through.

const SETUP_BINARY: &str = "imploid-setup";

/// Launch the configuration wizard, optionally against an explicit config
/// path. Returns the wizard's exit code.
pub fn run_wizard(config_path: Option<&str>) -> i32 {
    let mut cmd = std::process::Command::new(SETUP_BINARY);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    run(cmd)
}

/// Mirror the command templates into the user's config directory.
pub fn install_commands() -> i32 {
    let mut cmd = std::process::Command::new(SETUP_BINARY);
    cmd.arg("--install-commands");
    run(cmd)
}

fn run(mut cmd: std::process::Command) -> i32 {
    match cmd.status() {
        Ok(status) => status.code().unwrap_or(1),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("{} not found on PATH; install the companion setup tool", SETUP_BINARY);
            1
        }
        Err(e) => {
            eprintln!("failed to run {}: {}", SETUP_BINARY, e);
            1
        }
    }
}
