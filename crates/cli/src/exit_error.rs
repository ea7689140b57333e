// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type carrying the process exit code.
//!
//! The exit-code contract is narrow: 0 for a normal run, 1 for a lock
//! conflict, missing configuration, or any unhandled error. Delegated
//! companion tools (`imploid-setup`) pass their own codes through. Command
//! paths return `ExitError` instead of calling `std::process::exit()` so
//! `main()` owns process termination.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Pass through a delegated tool's exit status. Zero is success; any
    /// other code propagates silently, since the tool already reported to
    /// the user on its own stderr.
    pub fn check_status(code: i32) -> Result<(), Self> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self::new(code, String::new()))
        }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExitError {}
