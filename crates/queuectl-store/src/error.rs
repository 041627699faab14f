// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::state::JobState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Invalid job submission: {0}")]
	Validation(String),

	#[error("Job already exists: {0}")]
	DuplicateId(String),

	#[error("Job not found: {0}")]
	NotFound(String),

	#[error("Job {id} cannot move from {from} to {to}")]
	InvalidTransition {
		id: String,
		from: JobState,
		to: JobState,
	},

	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Corrupt job table: {0}")]
	Corrupt(String),
}

impl StoreError {
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	/// Busy or locked database, or an exhausted pool. Worth retrying after a pause.
	pub fn is_transient(&self) -> bool {
		match self {
			StoreError::Sqlx(sqlx::Error::PoolTimedOut) => true,
			StoreError::Sqlx(sqlx::Error::Io(_)) => true,
			StoreError::Sqlx(sqlx::Error::Database(e)) => {
				let message = e.message();
				matches!(primary_code(&**e), Some(SQLITE_BUSY | SQLITE_LOCKED))
					|| message.contains("database is locked")
					|| message.contains("database is busy")
			}
			_ => false,
		}
	}

	/// The table holds data this build cannot interpret, or the database file
	/// itself is damaged. Retrying will not help.
	pub fn is_fatal(&self) -> bool {
		match self {
			StoreError::Corrupt(_) => true,
			StoreError::Sqlx(sqlx::Error::Database(e)) => {
				let message = e.message();
				matches!(primary_code(&**e), Some(SQLITE_CORRUPT | SQLITE_NOTADB))
					|| message.contains("malformed")
					|| message.contains("not a database")
			}
			_ => false,
		}
	}
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;

/// SQLite reports extended result codes; the low byte is the primary code.
fn primary_code(e: &dyn sqlx::error::DatabaseError) -> Option<i32> {
	e.code()?.parse::<i32>().ok().map(|code| code & 0xff)
}

pub type Result<T> = std::result::Result<T, StoreError>;
