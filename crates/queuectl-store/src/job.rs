// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::pool;
use crate::state::JobState;

const JOB_COLUMNS: &str =
	"id, command, state, attempts, max_retries, created_at, updated_at, last_error";

type JobRow = (
	String,
	String,
	String,
	i64,
	i64,
	String,
	String,
	Option<String>,
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
	pub id: String,
	pub command: String,
	pub state: JobState,
	pub attempts: u32,
	pub max_retries: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub last_error: Option<String>,
}

impl JobRecord {
	fn from_row(row: JobRow) -> Result<Self> {
		let (id, command, state, attempts, max_retries, created_at, updated_at, last_error) = row;
		Ok(Self {
			state: state
				.parse()
				.map_err(|e: String| StoreError::Corrupt(format!("job {id}: {e}")))?,
			attempts: decode_count(&id, "attempts", attempts)?,
			max_retries: decode_count(&id, "max_retries", max_retries)?,
			created_at: decode_timestamp(&id, &created_at)?,
			updated_at: decode_timestamp(&id, &updated_at)?,
			id,
			command,
			last_error,
		})
	}
}

/// A job about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
	pub id: String,
	pub command: String,
	pub max_retries: u32,
	pub state: JobState,
}

impl NewJob {
	pub fn new(id: impl Into<String>, command: impl Into<String>, max_retries: u32) -> Self {
		Self {
			id: id.into(),
			command: command.into(),
			max_retries,
			state: JobState::Pending,
		}
	}

	/// Insert with a state other than `pending`, for re-enqueue flows.
	pub fn with_state(mut self, state: JobState) -> Self {
		self.state = state;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.id.trim().is_empty() {
			return Err(StoreError::validation("id must not be empty"));
		}
		if self.command.trim().is_empty() {
			return Err(StoreError::validation("command must not be empty"));
		}
		Ok(())
	}
}

/// JSON payload accepted by `enqueue`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSubmission {
	pub id: Option<String>,
	pub command: Option<String>,
	pub max_retries: Option<u32>,
	pub state: Option<JobState>,
}

impl JobSubmission {
	pub fn from_json(payload: &str) -> Result<Self> {
		serde_json::from_str(payload)
			.map_err(|e| StoreError::validation(format!("invalid JSON payload: {e}")))
	}

	/// Fill in defaults and validate. `default_max_retries` comes from the
	/// configuration in effect at enqueue time and is fixed for the job's lifetime.
	pub fn into_new_job(self, default_max_retries: u32) -> Result<NewJob> {
		let command = self
			.command
			.ok_or_else(|| StoreError::validation("missing field: command"))?;
		let id = self.id.unwrap_or_else(generate_job_id);
		let job = NewJob::new(id, command, self.max_retries.unwrap_or(default_max_retries))
			.with_state(self.state.unwrap_or(JobState::Pending));
		job.validate()?;
		Ok(job)
	}
}

/// `job-` followed by eight hex characters of a fresh v4 UUID.
pub fn generate_job_id() -> String {
	let uuid = uuid::Uuid::new_v4().simple().to_string();
	format!("job-{}", &uuid[..8])
}

/// The durable job table. Cloning is cheap and shares the underlying pool.
#[derive(Clone)]
pub struct JobStore {
	pool: SqlitePool,
}

impl JobStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Open (creating if needed) the database file and make sure the schema exists.
	pub async fn open(path: &Path) -> Result<Self> {
		let pool = pool::create_pool(path).await?;
		pool::ensure_schema(&pool).await?;
		Ok(Self::new(pool))
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	#[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
	pub async fn insert(&self, job: &NewJob) -> Result<JobRecord> {
		job.validate()?;
		let now = now_timestamp();

		let result = sqlx::query(
			r#"
			INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at, last_error)
			VALUES (?, ?, ?, 0, ?, ?, ?, NULL)
			"#,
		)
		.bind(&job.id)
		.bind(&job.command)
		.bind(job.state.as_str())
		.bind(job.max_retries as i64)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
				return Err(StoreError::DuplicateId(job.id.clone()));
			}
			Err(e) => return Err(e.into()),
		}

		tracing::debug!(state = %job.state, "job inserted");
		self.get(&job.id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, id: &str) -> Result<JobRecord> {
		let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		row
			.map(JobRecord::from_row)
			.transpose()?
			.ok_or_else(|| StoreError::NotFound(id.to_string()))
	}

	/// All jobs, or only those in `state`, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn list(&self, state: Option<JobState>) -> Result<Vec<JobRecord>> {
		let rows = match state {
			Some(state) => {
				sqlx::query_as::<_, JobRow>(&format!(
					"SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? ORDER BY created_at, rowid"
				))
				.bind(state.as_str())
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, JobRow>(&format!(
					"SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at, rowid"
				))
				.fetch_all(&self.pool)
				.await?
			}
		};

		rows.into_iter().map(JobRecord::from_row).collect()
	}

	/// Count of jobs per state. States with no jobs are absent.
	#[tracing::instrument(skip(self))]
	pub async fn summary(&self) -> Result<BTreeMap<JobState, u64>> {
		let rows = sqlx::query_as::<_, (String, i64)>(
			"SELECT state, COUNT(*) FROM jobs GROUP BY state",
		)
		.fetch_all(&self.pool)
		.await?;

		rows
			.into_iter()
			.map(|(state, count)| {
				let state = state
					.parse::<JobState>()
					.map_err(StoreError::Corrupt)?;
				Ok((state, count as u64))
			})
			.collect()
	}

	/// Take ownership of the oldest eligible job.
	///
	/// Selection and mutation are a single guarded UPDATE, so two workers can
	/// never both move the same row to `processing`. SQLite takes the write
	/// lock before evaluating the subquery; concurrent claimers queue on the
	/// busy timeout and then see the already-claimed row as ineligible.
	#[tracing::instrument(skip(self))]
	pub async fn claim_next(&self) -> Result<Option<JobRecord>> {
		let now = now_timestamp();

		let row = sqlx::query_as::<_, JobRow>(&format!(
			r#"
			UPDATE jobs
			SET state = 'processing', attempts = attempts + 1, updated_at = ?
			WHERE id = (
				SELECT id FROM jobs
				WHERE state IN ('pending', 'failed')
				ORDER BY created_at, rowid
				LIMIT 1
			)
			AND state IN ('pending', 'failed')
			RETURNING {JOB_COLUMNS}
			"#
		))
		.bind(&now)
		.fetch_optional(&self.pool)
		.await?;

		let claimed = row.map(JobRecord::from_row).transpose()?;
		if let Some(job) = &claimed {
			tracing::debug!(job_id = %job.id, attempts = job.attempts, "job claimed");
		}
		Ok(claimed)
	}

	/// Record the result of an attempt on a `processing` job.
	///
	/// `attempts_after` must match the stored attempt count, which ties the
	/// outcome to the claim that produced it.
	#[tracing::instrument(skip(self, error))]
	pub async fn record_outcome(
		&self,
		id: &str,
		success: bool,
		attempts_after: u32,
		max_retries: u32,
		error: Option<&str>,
	) -> Result<JobRecord> {
		let next = JobState::after_attempt(success, attempts_after, max_retries);
		debug_assert!(JobState::Processing.can_transition_to(next));
		let last_error = if success { None } else { error };
		let now = now_timestamp();

		let row = sqlx::query_as::<_, JobRow>(&format!(
			r#"
			UPDATE jobs
			SET state = ?, last_error = ?, updated_at = ?
			WHERE id = ? AND state = 'processing' AND attempts = ?
			RETURNING {JOB_COLUMNS}
			"#
		))
		.bind(next.as_str())
		.bind(last_error)
		.bind(&now)
		.bind(id)
		.bind(attempts_after as i64)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let job = JobRecord::from_row(row)?;
				tracing::debug!(state = %job.state, "outcome recorded");
				Ok(job)
			}
			None => Err(self.rejected_transition(id, next).await),
		}
	}

	/// Move a dead job back to `pending` with a fresh retry budget.
	#[tracing::instrument(skip(self))]
	pub async fn reset_from_dead_letter(&self, id: &str) -> Result<JobRecord> {
		debug_assert!(JobState::Dead.can_transition_to(JobState::Pending));
		let now = now_timestamp();

		let row = sqlx::query_as::<_, JobRow>(&format!(
			r#"
			UPDATE jobs
			SET state = 'pending', attempts = 0, last_error = NULL, updated_at = ?
			WHERE id = ? AND state = 'dead'
			RETURNING {JOB_COLUMNS}
			"#
		))
		.bind(&now)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				tracing::info!(job_id = %id, "job re-queued from dead letter");
				JobRecord::from_row(row)
			}
			None => Err(self.rejected_transition(id, JobState::Pending).await),
		}
	}

	/// Explain why a guarded update matched no row.
	async fn rejected_transition(&self, id: &str, to: JobState) -> StoreError {
		match self.get(id).await {
			Ok(current) => StoreError::InvalidTransition {
				id: id.to_string(),
				from: current.state,
				to,
			},
			Err(e) => e,
		}
	}
}

/// Fixed-width UTC timestamp; lexical order is chronological order.
fn now_timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|t| t.with_timezone(&Utc))
		.map_err(|e| StoreError::Corrupt(format!("job {id}: bad timestamp {value:?}: {e}")))
}

fn decode_count(id: &str, column: &str, value: i64) -> Result<u32> {
	u32::try_from(value)
		.map_err(|_| StoreError::Corrupt(format!("job {id}: {column} out of range: {value}")))
}
