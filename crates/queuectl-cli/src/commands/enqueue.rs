// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use queuectl_store::JobSubmission;

use super::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct EnqueueArgs {
	/// JSON payload, e.g. '{"id":"job1","command":"sleep 2","max_retries":5}'
	#[arg(
		required_unless_present = "command",
		conflicts_with_all = ["command", "id", "max_retries"]
	)]
	pub payload: Option<String>,

	/// Shell command to run, instead of a JSON payload
	#[arg(long)]
	pub command: Option<String>,

	/// Job id (generated when omitted)
	#[arg(long)]
	pub id: Option<String>,

	/// Retry budget for this job (defaults to the configured max_retries)
	#[arg(long)]
	pub max_retries: Option<u32>,
}

impl EnqueueArgs {
	fn into_submission(self) -> anyhow::Result<JobSubmission> {
		match self.payload {
			Some(payload) => Ok(JobSubmission::from_json(&payload)?),
			None => Ok(JobSubmission {
				id: self.id,
				command: self.command,
				max_retries: self.max_retries,
				state: None,
			}),
		}
	}
}

pub async fn run(ctx: &Context, args: EnqueueArgs) -> anyhow::Result<()> {
	let job = args.into_submission()?.into_new_job(ctx.config.max_retries)?;

	let store = ctx.open_store().await?;
	let record = store.insert(&job).await?;

	tracing::info!(job_id = %record.id, max_retries = record.max_retries, "job enqueued");
	println!("{} {}", "Enqueued job".green(), record.id.bold());
	Ok(())
}
