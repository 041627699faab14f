// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// How long a writer waits on another process's write lock before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a SqlitePool on `path` with WAL mode and common settings.
///
/// Every worker process opens its own pool against the same file; the
/// busy timeout is what serializes their writes.
pub async fn create_pool(path: &Path) -> Result<SqlitePool> {
	create_pool_with_busy_timeout(path, BUSY_TIMEOUT).await
}

#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub async fn create_pool_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::new()
		.filename(path)
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(busy_timeout)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Create the `jobs` table and its index if they do not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS jobs (
			id TEXT PRIMARY KEY NOT NULL,
			command TEXT NOT NULL,
			state TEXT NOT NULL
				CHECK (state IN ('pending', 'processing', 'completed', 'failed', 'dead')),
			attempts INTEGER NOT NULL DEFAULT 0 CHECK (attempts >= 0),
			max_retries INTEGER NOT NULL CHECK (max_retries >= 0),
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			last_error TEXT
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_state_created ON jobs(state, created_at)")
		.execute(pool)
		.await?;

	Ok(())
}
