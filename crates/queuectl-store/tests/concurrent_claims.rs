// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Several independent pools on one database file stand in for separate
//! worker processes. Every job must be handed out exactly once.

use std::collections::HashSet;

use queuectl_store::{JobState, JobStore, NewJob};

const JOBS: usize = 60;
const WORKERS: usize = 6;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_job_is_claimed_exactly_once() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("queuectl.db");

	let producer = JobStore::open(&path).await.unwrap();
	for i in 0..JOBS {
		producer
			.insert(&NewJob::new(format!("job-{i:03}"), "true", 3))
			.await
			.unwrap();
	}

	let mut handles = Vec::new();
	for _ in 0..WORKERS {
		let store = JobStore::open(&path).await.unwrap();
		handles.push(tokio::spawn(async move {
			let mut claimed = Vec::new();
			while let Some(job) = store.claim_next().await.unwrap() {
				assert_eq!(job.state, JobState::Processing);
				assert_eq!(job.attempts, 1);
				claimed.push(job.id);
			}
			claimed
		}));
	}

	let mut seen = HashSet::new();
	let mut total = 0;
	for handle in handles {
		for id in handle.await.unwrap() {
			total += 1;
			assert!(seen.insert(id.clone()), "job {id} was claimed twice");
		}
	}

	assert_eq!(total, JOBS);
	assert_eq!(seen.len(), JOBS);

	let summary = producer.summary().await.unwrap();
	assert_eq!(summary.get(&JobState::Processing), Some(&(JOBS as u64)));
	assert_eq!(summary.get(&JobState::Pending), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retry_cycles_under_contention_count_every_attempt() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("queuectl.db");

	let producer = JobStore::open(&path).await.unwrap();
	for i in 0..10 {
		producer
			.insert(&NewJob::new(format!("flaky-{i}"), "false", 3))
			.await
			.unwrap();
	}

	let mut handles = Vec::new();
	for _ in 0..3 {
		let store = JobStore::open(&path).await.unwrap();
		handles.push(tokio::spawn(async move {
			while let Some(job) = store.claim_next().await.unwrap() {
				store
					.record_outcome(
						&job.id,
						false,
						job.attempts,
						job.max_retries,
						Some("exit_code=1"),
					)
					.await
					.unwrap();
			}
		}));
	}
	for handle in handles {
		handle.await.unwrap();
	}

	let jobs = producer.list(None).await.unwrap();
	assert_eq!(jobs.len(), 10);
	for job in jobs {
		assert_eq!(job.state, JobState::Dead);
		assert_eq!(job.attempts, 3);
		assert_eq!(job.last_error.as_deref(), Some("exit_code=1"));
	}
}
