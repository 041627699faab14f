// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ExecutionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Succeeded,
	Failed { error: String },
}

impl Outcome {
	pub fn is_success(&self) -> bool {
		matches!(self, Outcome::Succeeded)
	}

	pub fn error(&self) -> Option<&str> {
		match self {
			Outcome::Succeeded => None,
			Outcome::Failed { error } => Some(error),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Execution {
	pub outcome: Outcome,
	pub duration: Duration,
}

/// Runs a job's command to completion.
///
/// Implementations never return an error: a command that cannot be started
/// is a failed attempt like any other.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	async fn run(&self, command: &str) -> Execution;
}

/// Runs commands through the platform shell, inheriting stdout and stderr.
///
/// There is no timeout; a command that never exits holds its worker forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
	pub fn new() -> Self {
		Self
	}

	async fn spawn_and_wait(&self, command: &str) -> Result<ExitStatus, ExecutionError> {
		let mut child = shell_command(command)
			.stdin(Stdio::null())
			.spawn()
			.map_err(ExecutionError::Launch)?;
		child.wait().await.map_err(ExecutionError::Wait)
	}
}

#[async_trait]
impl CommandRunner for ShellRunner {
	async fn run(&self, command: &str) -> Execution {
		let started = Instant::now();
		let outcome = match self.spawn_and_wait(command).await {
			Ok(status) => classify_exit(status),
			Err(e) => {
				warn!(error = %e, "command could not be run");
				Outcome::Failed {
					error: e.to_string(),
				}
			}
		};
		let duration = started.elapsed();
		debug!(
				duration_ms = duration.as_millis() as u64,
				success = outcome.is_success(),
				"command finished"
		);
		Execution { outcome, duration }
	}
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
	let mut cmd = Command::new("sh");
	cmd.arg("-c").arg(command);
	// Own process group: a Ctrl-C or group signal aimed at the worker must
	// not interrupt the job it is running.
	cmd.process_group(0);
	cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
	let mut cmd = Command::new("cmd");
	cmd.arg("/C").arg(command);
	cmd
}

pub fn classify_exit(status: ExitStatus) -> Outcome {
	if status.success() {
		return Outcome::Succeeded;
	}
	if let Some(code) = status.code() {
		return Outcome::Failed {
			error: format!("exit_code={code}"),
		};
	}
	#[cfg(unix)]
	{
		use std::os::unix::process::ExitStatusExt;
		if let Some(signal) = status.signal() {
			return Outcome::Failed {
				error: format!("terminated_by_signal={signal}"),
			};
		}
	}
	Outcome::Failed {
		error: format!("abnormal exit: {status}"),
	}
}
