// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use queuectl_store::{JobRecord, JobState, JobStore};
use tracing::{error, info, instrument, warn};

use crate::context::CancellationToken;
use crate::error::{Result, WorkerError};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::runner::{CommandRunner, ShellRunner};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How many times a finished attempt's outcome is offered to a busy store
/// before the worker gives up on it.
const OUTCOME_RECORD_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
	pub poll_interval: Duration,
	pub retry: RetryPolicy,
}

impl Default for WorkerSettings {
	fn default() -> Self {
		Self {
			poll_interval: DEFAULT_POLL_INTERVAL,
			retry: RetryPolicy::default(),
		}
	}
}

/// Result of one pass through the loop body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
	/// Nothing was eligible.
	Idle,
	/// A job was claimed, run, and its outcome recorded.
	Processed(JobRecord),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
	pub processed: u64,
	pub completed: u64,
	pub failed: u64,
	pub dead: u64,
}

impl WorkerStats {
	fn record(&mut self, job: &JobRecord) {
		self.processed += 1;
		match job.state {
			JobState::Completed => self.completed += 1,
			JobState::Failed => self.failed += 1,
			JobState::Dead => self.dead += 1,
			JobState::Pending | JobState::Processing => {}
		}
	}
}

/// One worker: claims a job, runs it, records the outcome, repeats.
///
/// Shutdown is checked only between jobs. A job that has been claimed is
/// always run to completion and recorded, so a graceful stop never strands
/// a job in `processing`.
pub struct Worker<R = ShellRunner> {
	id: String,
	store: JobStore,
	runner: R,
	settings: WorkerSettings,
	shutdown: CancellationToken,
}

impl<R: CommandRunner> Worker<R> {
	pub fn new(
		id: impl Into<String>,
		store: JobStore,
		runner: R,
		settings: WorkerSettings,
		shutdown: CancellationToken,
	) -> Self {
		Self {
			id: id.into(),
			store,
			runner,
			settings,
			shutdown,
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Run until shutdown is requested or the store turns out to be corrupt.
	#[instrument(skip(self), fields(worker_id = %self.id))]
	pub async fn run(&self) -> Result<WorkerStats> {
		info!(
				poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
				backoff_base = self.settings.retry.backoff_base(),
				"worker started"
		);

		let mut stats = WorkerStats::default();

		loop {
			if self.shutdown.is_cancelled() {
				info!("shutdown requested, worker exiting");
				break;
			}

			match self.run_once().await {
				Ok(Tick::Idle) => {
					self.shutdown.sleep(self.settings.poll_interval).await;
				}
				Ok(Tick::Processed(job)) => {
					stats.record(&job);
					if job.state == JobState::Failed {
						self.shutdown.sleep(self.settings.retry.delay(job.attempts)).await;
					}
				}
				Err(e) if e.is_fatal() => {
					error!(error = %e, "unrecoverable store error, worker stopping");
					return Err(e);
				}
				Err(e) => {
					warn!(error = %e, "poll failed, retrying after poll interval");
					self.shutdown.sleep(self.settings.poll_interval).await;
				}
			}
		}

		info!(
				processed = stats.processed,
				completed = stats.completed,
				failed = stats.failed,
				dead = stats.dead,
				"worker stopped"
		);
		Ok(stats)
	}

	/// Claim at most one job, run it, and record the outcome.
	pub async fn run_once(&self) -> Result<Tick> {
		let Some(job) = self.store.claim_next().await? else {
			return Ok(Tick::Idle);
		};

		info!(
				job_id = %job.id,
				attempt = job.attempts,
				max_retries = job.max_retries,
				command = %job.command,
				"processing job"
		);

		let execution = self.runner.run(&job.command).await;
		let duration_ms = execution.duration.as_millis() as u64;
		let updated = self.record_outcome(&job, execution.outcome.error()).await?;

		match updated.state {
			JobState::Completed => {
				info!(job_id = %updated.id, duration_ms, "job completed");
			}
			_ => {
				let error = updated.last_error.as_deref().unwrap_or_default();
				match self.settings.retry.decide(updated.attempts, updated.max_retries) {
					RetryDecision::Retry => warn!(
							job_id = %updated.id,
							attempts = updated.attempts,
							duration_ms,
							retry_in_ms = self.settings.retry.delay(updated.attempts).as_millis() as u64,
							error,
							"job failed, will be retried"
					),
					RetryDecision::DeadLetter => warn!(
							job_id = %updated.id,
							attempts = updated.attempts,
							duration_ms,
							error,
							"job failed permanently, moved to dead letter queue"
					),
				}
			}
		}

		Ok(Tick::Processed(updated))
	}

	/// The attempt already ran, so its outcome is worth waiting for. Transient
	/// store errors are retried regardless of shutdown.
	async fn record_outcome(&self, job: &JobRecord, error: Option<&str>) -> Result<JobRecord> {
		let success = error.is_none();
		let mut attempt = 1;

		loop {
			let result = self
				.store
				.record_outcome(&job.id, success, job.attempts, job.max_retries, error)
				.await;

			match result {
				Ok(updated) => return Ok(updated),
				Err(e) if e.is_transient() && attempt < OUTCOME_RECORD_ATTEMPTS => {
					warn!(job_id = %job.id, attempt, error = %e, "failed to record outcome, retrying");
					attempt += 1;
					tokio::time::sleep(self.settings.poll_interval).await;
				}
				Err(e) => {
					error!(job_id = %job.id, error = %e, "failed to record outcome");
					return Err(WorkerError::Store(e));
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::runner::{Execution, Outcome};
	use async_trait::async_trait;
	use queuectl_store::testing::{
		corrupt_created_at, create_damaged_database, create_test_store, open_impatient_store,
		WriteLock,
	};
	use queuectl_store::NewJob;
	use std::path::PathBuf;
	use std::sync::{Arc, Mutex};

	/// Fails every command whose text starts with "fail", succeeds otherwise.
	#[derive(Clone, Default)]
	struct ScriptedRunner {
		seen: Arc<Mutex<Vec<String>>>,
	}

	#[async_trait]
	impl CommandRunner for ScriptedRunner {
		async fn run(&self, command: &str) -> Execution {
			self.seen.lock().unwrap().push(command.to_string());
			let outcome = if command.starts_with("fail") {
				Outcome::Failed {
					error: "exit_code=1".to_string(),
				}
			} else {
				Outcome::Succeeded
			};
			Execution {
				outcome,
				duration: Duration::from_millis(1),
			}
		}
	}

	fn fast_settings() -> WorkerSettings {
		WorkerSettings {
			poll_interval: Duration::from_millis(5),
			retry: RetryPolicy::new(2.0, Duration::from_millis(10)),
		}
	}

	fn worker(store: JobStore, runner: ScriptedRunner) -> Worker<ScriptedRunner> {
		Worker::new(
			"worker-test",
			store,
			runner,
			fast_settings(),
			CancellationToken::new(),
		)
	}

	fn processed(tick: Tick) -> JobRecord {
		match tick {
			Tick::Processed(job) => job,
			Tick::Idle => panic!("expected a processed job"),
		}
	}

	#[tokio::test]
	async fn test_run_once_idle_on_empty_store() {
		let store = create_test_store().await;
		let worker = worker(store, ScriptedRunner::default());
		assert_eq!(worker.run_once().await.unwrap(), Tick::Idle);
	}

	#[tokio::test]
	async fn test_run_once_completes_successful_job() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("ok", "echo hi", 3)).await.unwrap();
		let runner = ScriptedRunner::default();
		let worker = worker(store.clone(), runner.clone());

		let job = processed(worker.run_once().await.unwrap());
		assert_eq!(job.state, JobState::Completed);
		assert_eq!(job.attempts, 1);
		assert_eq!(*runner.seen.lock().unwrap(), vec!["echo hi".to_string()]);
	}

	#[tokio::test]
	async fn test_attempts_count_failed_claims_until_dead() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("flaky", "fail", 4)).await.unwrap();
		let worker = worker(store.clone(), ScriptedRunner::default());

		for n in 1..=3 {
			let job = processed(worker.run_once().await.unwrap());
			assert_eq!(job.attempts, n);
			assert_eq!(job.state, JobState::Failed);
		}
		let job = processed(worker.run_once().await.unwrap());
		assert_eq!(job.attempts, 4);
		assert_eq!(job.state, JobState::Dead);
		assert_eq!(worker.run_once().await.unwrap(), Tick::Idle);
	}

	#[tokio::test]
	async fn test_run_stops_immediately_when_already_cancelled() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("untouched", "echo", 3)).await.unwrap();
		let worker = worker(store.clone(), ScriptedRunner::default());
		worker.shutdown.cancel();

		let stats = worker.run().await.unwrap();
		assert_eq!(stats, WorkerStats::default());
		assert_eq!(store.get("untouched").await.unwrap().state, JobState::Pending);
	}

	#[tokio::test]
	async fn test_run_drains_queue_then_shuts_down() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("a", "echo a", 3)).await.unwrap();
		store.insert(&NewJob::new("b", "fail b", 2)).await.unwrap();
		store.insert(&NewJob::new("c", "echo c", 3)).await.unwrap();

		let shutdown = CancellationToken::new();
		let worker = Worker::new(
			"worker-1",
			store.clone(),
			ScriptedRunner::default(),
			fast_settings(),
			shutdown.clone(),
		);
		let handle = tokio::spawn(async move { worker.run().await });

		for _ in 0..500 {
			let summary = store.summary().await.unwrap();
			if summary.get(&JobState::Completed) == Some(&2) && summary.get(&JobState::Dead) == Some(&1)
			{
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		shutdown.cancel();

		let stats = handle.await.unwrap().unwrap();
		assert_eq!(stats.processed, 4);
		assert_eq!(stats.completed, 2);
		assert_eq!(stats.failed, 1);
		assert_eq!(stats.dead, 1);

		let dead = store.get("b").await.unwrap();
		assert_eq!(dead.state, JobState::Dead);
		assert_eq!(dead.attempts, 2);
	}

	#[tokio::test]
	async fn test_shutdown_interrupts_backoff_pause() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("slow-retry", "fail", 10)).await.unwrap();

		let shutdown = CancellationToken::new();
		let settings = WorkerSettings {
			poll_interval: Duration::from_millis(5),
			retry: RetryPolicy::new(2.0, Duration::from_secs(3600)),
		};
		let worker = Worker::new(
			"worker-backoff",
			store.clone(),
			ScriptedRunner::default(),
			settings,
			shutdown.clone(),
		);
		let handle = tokio::spawn(async move { worker.run().await });

		for _ in 0..500 {
			if store.get("slow-retry").await.unwrap().state == JobState::Failed {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		shutdown.cancel();

		let stats = tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.expect("worker should stop during backoff")
			.unwrap()
			.unwrap();
		assert_eq!(stats.failed, 1);
		assert_eq!(store.get("slow-retry").await.unwrap().attempts, 1);
	}

	/// Succeeds, but leaves the database write-locked for `hold` after returning,
	/// so the outcome lands on a busy store.
	struct LockingRunner {
		db: PathBuf,
		hold: Duration,
	}

	#[async_trait]
	impl CommandRunner for LockingRunner {
		async fn run(&self, _command: &str) -> Execution {
			let lock = WriteLock::acquire(&self.db).await;
			let hold = self.hold;
			tokio::spawn(async move {
				tokio::time::sleep(hold).await;
				lock.release().await;
			});
			Execution {
				outcome: Outcome::Succeeded,
				duration: Duration::ZERO,
			}
		}
	}

	#[tokio::test]
	async fn test_run_stops_with_error_on_undecodable_row() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("mangled", "echo", 3)).await.unwrap();
		corrupt_created_at(&store, "mangled").await;
		let worker = worker(store, ScriptedRunner::default());

		let err = tokio::time::timeout(Duration::from_secs(5), worker.run())
			.await
			.expect("worker should stop on a corrupt row")
			.unwrap_err();
		assert!(err.is_fatal());
	}

	#[tokio::test]
	async fn test_run_stops_with_error_on_damaged_database_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queuectl.db");
		create_damaged_database(&path, 50).await;
		let store = JobStore::open(&path).await.unwrap();
		let runner = ScriptedRunner::default();
		let worker = worker(store, runner.clone());

		let err = tokio::time::timeout(Duration::from_secs(5), worker.run())
			.await
			.expect("worker should stop on a damaged database")
			.unwrap_err();
		assert!(err.is_fatal());
		assert!(runner.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_outcome_recorded_once_write_lock_clears() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queuectl.db");
		let store = open_impatient_store(&path, Duration::from_millis(20)).await;
		store.insert(&NewJob::new("contended", "echo", 3)).await.unwrap();

		let runner = LockingRunner {
			db: path.clone(),
			hold: Duration::from_millis(30),
		};
		let worker = Worker::new(
			"worker-busy",
			store.clone(),
			runner,
			fast_settings(),
			CancellationToken::new(),
		);

		let job = processed(worker.run_once().await.unwrap());
		assert_eq!(job.state, JobState::Completed);
		assert_eq!(job.attempts, 1);
	}

	#[tokio::test]
	async fn test_outcome_recording_gives_up_after_repeated_busy_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queuectl.db");
		let store = open_impatient_store(&path, Duration::from_millis(10)).await;
		store.insert(&NewJob::new("stuck", "echo", 3)).await.unwrap();

		let runner = LockingRunner {
			db: path.clone(),
			hold: Duration::from_secs(30),
		};
		let worker = Worker::new(
			"worker-busy",
			store.clone(),
			runner,
			fast_settings(),
			CancellationToken::new(),
		);

		let err = worker.run_once().await.unwrap_err();
		assert!(!err.is_fatal());
		match err {
			WorkerError::Store(e) => assert!(e.is_transient(), "expected transient error, got {e}"),
		}
		assert_eq!(store.get("stuck").await.unwrap().state, JobState::Processing);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_shell_exit_zero_completes() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("job1", "exit 0", 3)).await.unwrap();
		let worker = Worker::new(
			"worker-shell",
			store.clone(),
			ShellRunner::new(),
			fast_settings(),
			CancellationToken::new(),
		);

		let job = processed(worker.run_once().await.unwrap());
		assert_eq!(job.state, JobState::Completed);
		assert_eq!(job.attempts, 1);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_shell_exit_one_goes_dead_after_max_retries() {
		let store = create_test_store().await;
		store.insert(&NewJob::new("job2", "exit 1", 2)).await.unwrap();
		let worker = Worker::new(
			"worker-shell",
			store.clone(),
			ShellRunner::new(),
			fast_settings(),
			CancellationToken::new(),
		);

		let first = processed(worker.run_once().await.unwrap());
		assert_eq!(first.state, JobState::Failed);
		let second = processed(worker.run_once().await.unwrap());
		assert_eq!(second.state, JobState::Dead);
		assert_eq!(second.attempts, 2);
		assert!(second.last_error.unwrap().contains("exit_code=1"));
	}
}
