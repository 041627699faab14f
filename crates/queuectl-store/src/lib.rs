// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable job table for queuectl.
//!
//! A single SQLite file holds every job. Worker processes share nothing but
//! this file, so every lifecycle transition is one guarded statement and the
//! database is the only arbiter between them.

pub mod error;
pub mod job;
pub mod pool;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Result, StoreError};
pub use job::{generate_job_id, JobRecord, JobStore, JobSubmission, NewJob};
pub use pool::{create_pool, create_pool_with_busy_timeout, ensure_schema};
pub use state::JobState;
