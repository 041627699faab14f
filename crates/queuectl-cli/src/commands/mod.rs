// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod config;
pub mod dlq;
pub mod enqueue;
pub mod list;
pub mod status;
pub mod worker;

use std::path::Path;

use anyhow::Context as _;
use queuectl_config::{QueueConfig, QueuePaths};
use queuectl_store::{JobRecord, JobStore};

use crate::logging::LogFormat;

/// Everything a command needs, resolved once at startup.
pub struct Context {
	pub paths: QueuePaths,
	pub config: QueueConfig,
	pub log_level: String,
	pub log_format: LogFormat,
}

impl Context {
	pub fn load(home: Option<&Path>, log_level: String, log_format: LogFormat) -> anyhow::Result<Self> {
		let (paths, config) =
			queuectl_config::load_config(home).context("failed to load queue configuration")?;
		Ok(Self {
			paths,
			config,
			log_level,
			log_format,
		})
	}

	pub async fn open_store(&self) -> anyhow::Result<JobStore> {
		JobStore::open(&self.paths.db_file)
			.await
			.with_context(|| format!("failed to open job store at {}", self.paths.db_file.display()))
	}
}

pub fn print_jobs(jobs: &[JobRecord]) -> anyhow::Result<()> {
	for job in jobs {
		println!("{}", serde_json::to_string_pretty(job)?);
	}
	Ok(())
}
