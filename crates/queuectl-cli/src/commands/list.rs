// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use queuectl_store::JobState;

use super::{print_jobs, Context};

#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
	/// Only show jobs in this state (pending, processing, completed, failed, dead)
	#[arg(long, value_parser = parse_state)]
	pub state: Option<JobState>,
}

fn parse_state(s: &str) -> Result<JobState, String> {
	s.parse()
}

pub async fn run(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
	let store = ctx.open_store().await?;
	let jobs = store.list(args.state).await?;

	if jobs.is_empty() {
		println!("No jobs");
		return Ok(());
	}
	print_jobs(&jobs)
}
