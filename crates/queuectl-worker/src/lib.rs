// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker side of queuectl.
//!
//! A [`Worker`] polls the shared job table, claims one eligible job at a
//! time, runs its command through a [`CommandRunner`], and records the
//! outcome. Failed attempts are paced by a [`RetryPolicy`] before the next
//! poll. Each worker process runs exactly one loop.

pub mod context;
pub mod error;
pub mod retry;
pub mod runner;
pub mod worker;

pub use context::CancellationToken;
pub use error::{ExecutionError, Result, WorkerError};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{CommandRunner, Execution, Outcome, ShellRunner};
pub use worker::{Tick, Worker, WorkerSettings, WorkerStats, DEFAULT_POLL_INTERVAL};
