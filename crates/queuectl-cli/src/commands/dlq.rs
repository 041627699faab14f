// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use queuectl_store::JobState;

use super::{print_jobs, Context};

#[derive(Debug, Clone, clap::Subcommand)]
pub enum DlqCommand {
	/// List jobs that exhausted their retries
	List,
	/// Send a dead job back to the queue with a fresh retry budget
	Retry {
		/// Id of the dead job
		job_id: String,
	},
}

pub async fn run(ctx: &Context, cmd: DlqCommand) -> anyhow::Result<()> {
	let store = ctx.open_store().await?;

	match cmd {
		DlqCommand::List => {
			let jobs = store.list(Some(JobState::Dead)).await?;
			if jobs.is_empty() {
				println!("DLQ empty");
				return Ok(());
			}
			print_jobs(&jobs)
		}
		DlqCommand::Retry { job_id } => {
			let job = store.reset_from_dead_letter(&job_id).await?;
			println!("{} {}", "Re-queued job from DLQ".green(), job.id.bold());
			Ok(())
		}
	}
}
