// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::ConnectOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use crate::job::{JobStore, NewJob};
use crate::pool;

/// In-memory database on a single long-lived connection. A second
/// connection would see a different, empty database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

pub async fn create_test_store() -> JobStore {
	let pool = create_test_pool().await;
	pool::ensure_schema(&pool).await.unwrap();
	JobStore::new(pool)
}

/// File-backed store that gives up on a held write lock after `busy_timeout`.
pub async fn open_impatient_store(path: &Path, busy_timeout: Duration) -> JobStore {
	let pool = pool::create_pool_with_busy_timeout(path, busy_timeout)
		.await
		.unwrap();
	pool::ensure_schema(&pool).await.unwrap();
	JobStore::new(pool)
}

/// A connection holding the database write lock until released or dropped.
pub struct WriteLock(SqliteConnection);

impl WriteLock {
	pub async fn acquire(path: &Path) -> Self {
		let mut conn = SqliteConnectOptions::new()
			.filename(path)
			.journal_mode(SqliteJournalMode::Wal)
			.connect()
			.await
			.unwrap();
		sqlx::query("BEGIN IMMEDIATE")
			.execute(&mut conn)
			.await
			.unwrap();
		Self(conn)
	}

	pub async fn release(mut self) {
		sqlx::query("ROLLBACK").execute(&mut self.0).await.unwrap();
	}
}

/// Create a database with `jobs` rows in it, then overwrite every page after
/// the header page with garbage. The schema page survives, so the file still
/// opens, but reading the job table fails with SQLITE_CORRUPT.
pub async fn create_damaged_database(path: &Path, jobs: usize) {
	let store = JobStore::open(path).await.unwrap();
	for i in 0..jobs {
		store
			.insert(&NewJob::new(format!("job-{i:04}"), "true", 3))
			.await
			.unwrap();
	}
	sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
		.execute(store.pool())
		.await
		.unwrap();
	store.pool().close().await;

	let mut file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
	let len = file.metadata().unwrap().len();
	assert!(len > 4096, "database too small to damage: {len} bytes");
	file.seek(SeekFrom::Start(4096)).unwrap();
	file.write_all(&vec![0xAB; (len - 4096) as usize]).unwrap();
	file.sync_all().unwrap();

	for suffix in ["-wal", "-shm"] {
		let mut sidecar = path.as_os_str().to_owned();
		sidecar.push(suffix);
		let _ = std::fs::remove_file(sidecar);
	}
}

/// Give one row a `created_at` that cannot be decoded.
pub async fn corrupt_created_at(store: &JobStore, id: &str) {
	sqlx::query("UPDATE jobs SET created_at = 'not-a-timestamp' WHERE id = ?")
		.bind(id)
		.execute(store.pool())
		.await
		.unwrap();
}
