// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use colored::Colorize;
use queuectl_store::JobState;

use super::Context;
use crate::supervisor::{self, PoolStatus};

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
	let store = ctx.open_store().await?;
	let summary = store.summary().await?;

	println!("{}", "Job summary:".bold());
	for state in JobState::ALL {
		let count = summary.get(&state).copied().unwrap_or(0);
		println!("  {:<10} : {}", state.as_str(), count);
	}
	println!("  {:<10} : {}", "total", summary.values().sum::<u64>());

	let pid_file = ctx.paths.pid_file.display();
	match supervisor::pool_status(&ctx.paths)? {
		PoolStatus::Running(pid) => {
			println!("Worker pool: {} (pid {pid}, pidfile {pid_file})", "running".green());
		}
		PoolStatus::Stale(pid) => {
			println!(
				"Worker pool: {} (pidfile {pid_file} names pid {pid}, which is not running)",
				"stale".yellow()
			);
		}
		PoolStatus::NotStarted => {
			println!("No worker pool pidfile found (workers may be running in the foreground)");
		}
	}
	Ok(())
}
