// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! imploid-storage: durable processing state and the cross-process lock.

pub mod lock;
pub mod state;

pub use lock::{LockFile, LockInfo};
pub use state::{SharedStateStore, StateKey, StateStore, StorageError};
