// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Location of the queue's files.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Environment variable naming the queue home directory.
pub const HOME_ENV: &str = "QUEUECTL_HOME";

/// Files that make up one queue. All live in a single home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
	/// Home directory: --home, $QUEUECTL_HOME, or the current directory
	pub home: PathBuf,
	/// Job database: <home>/queuectl.db
	pub db_file: PathBuf,
	/// Settings: <home>/config.toml
	pub config_file: PathBuf,
	/// Supervisor pid of a daemonized worker pool: <home>/queuectl_worker.pid
	pub pid_file: PathBuf,
	/// Output of a daemonized worker pool: <home>/queuectl_worker.log
	pub log_file: PathBuf,
}

impl QueuePaths {
	pub fn in_dir(home: impl AsRef<Path>) -> Self {
		let home = home.as_ref().to_path_buf();
		Self {
			db_file: home.join("queuectl.db"),
			config_file: home.join("config.toml"),
			pid_file: home.join("queuectl_worker.pid"),
			log_file: home.join("queuectl_worker.log"),
			home,
		}
	}

	/// Resolve the home directory. An explicit path wins over the
	/// environment, which wins over the current directory.
	pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
		let home = match explicit {
			Some(path) => path.to_path_buf(),
			None => match std::env::var_os(HOME_ENV) {
				Some(dir) if !dir.is_empty() => PathBuf::from(dir),
				_ => std::env::current_dir().map_err(|e| ConfigError::HomeDir(e.to_string()))?,
			},
		};

		tracing::debug!(home = %home.display(), "resolved queue home");
		Ok(Self::in_dir(home))
	}

	/// Create the home directory if it does not exist.
	pub fn ensure_home(&self) -> Result<(), ConfigError> {
		std::fs::create_dir_all(&self.home)?;
		Ok(())
	}
}
