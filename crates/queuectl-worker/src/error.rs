// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use queuectl_store::StoreError;

/// A command could not be run at all. Distinct from a nonzero exit, which is
/// an ordinary failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
	#[error("launch failed: {0}")]
	Launch(#[source] std::io::Error),

	#[error("wait failed: {0}")]
	Wait(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
	#[error("Store error: {0}")]
	Store(#[from] StoreError),
}

impl WorkerError {
	/// Errors that end the worker loop instead of being retried.
	pub fn is_fatal(&self) -> bool {
		match self {
			WorkerError::Store(e) => e.is_fatal(),
		}
	}
}

pub type Result<T> = std::result::Result<T, WorkerError>;
