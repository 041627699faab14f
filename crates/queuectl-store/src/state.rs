// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job lifecycle states and the transitions allowed between them.
//!
//! ```text
//! pending ──claim──▶ processing ──ok──▶ completed
//!    ▲                 │  ▲   │
//!    │           retry │  │   │ exhausted
//!    │                 ▼  │   ▼
//!    │               failed  dead
//!    └────────── dlq retry ────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
	Pending,
	Processing,
	Completed,
	Failed,
	Dead,
}

impl JobState {
	pub const ALL: [JobState; 5] = [
		JobState::Pending,
		JobState::Processing,
		JobState::Completed,
		JobState::Failed,
		JobState::Dead,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			JobState::Pending => "pending",
			JobState::Processing => "processing",
			JobState::Completed => "completed",
			JobState::Failed => "failed",
			JobState::Dead => "dead",
		}
	}

	/// Ready to be claimed by a worker.
	pub fn is_eligible(&self) -> bool {
		matches!(self, JobState::Pending | JobState::Failed)
	}

	/// Whether `self -> to` is an edge of the lifecycle graph. The store's
	/// guarded UPDATEs encode the same edges in SQL.
	pub fn can_transition_to(&self, to: JobState) -> bool {
		matches!(
			(self, to),
			(JobState::Pending, JobState::Processing)
				| (JobState::Failed, JobState::Processing)
				| (JobState::Processing, JobState::Completed)
				| (JobState::Processing, JobState::Failed)
				| (JobState::Processing, JobState::Dead)
				| (JobState::Dead, JobState::Pending)
		)
	}

	/// State a `processing` job moves to once its attempt finishes.
	///
	/// `attempts` is the post-claim count, so the first failure of a job with
	/// `max_retries = 1` is already terminal.
	pub fn after_attempt(success: bool, attempts: u32, max_retries: u32) -> JobState {
		if success {
			JobState::Completed
		} else if attempts >= max_retries {
			JobState::Dead
		} else {
			JobState::Failed
		}
	}
}

impl fmt::Display for JobState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for JobState {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(JobState::Pending),
			"processing" => Ok(JobState::Processing),
			"completed" => Ok(JobState::Completed),
			"failed" => Ok(JobState::Failed),
			"dead" => Ok(JobState::Dead),
			_ => Err(format!("unknown job state: {s}")),
		}
	}
}
