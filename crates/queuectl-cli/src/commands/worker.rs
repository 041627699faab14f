// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::Context as _;
use queuectl_worker::{CancellationToken, RetryPolicy, ShellRunner, Worker, WorkerSettings};

use super::Context;
use crate::supervisor;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum WorkerCommand {
	/// Start a pool of worker processes
	Start(StartArgs),
	/// Stop a daemonized worker pool
	Stop,
	/// Run a single worker loop in this process (spawned by `start`)
	#[command(hide = true)]
	Run {
		#[arg(long)]
		id: usize,
	},
}

#[derive(Debug, Clone, clap::Args)]
pub struct StartArgs {
	/// Number of worker processes
	#[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
	pub count: u16,

	/// Detach the pool and record its pid for `worker stop`
	#[arg(long)]
	pub daemon: bool,
}

pub async fn run(ctx: &Context, cmd: WorkerCommand) -> anyhow::Result<()> {
	match cmd {
		WorkerCommand::Start(args) if args.daemon => supervisor::start_daemon(ctx, args.count),
		WorkerCommand::Start(args) => supervisor::run_pool(ctx, args.count).await,
		WorkerCommand::Stop => supervisor::stop(&ctx.paths),
		WorkerCommand::Run { id } => run_worker(ctx, id).await,
	}
}

fn settings(ctx: &Context) -> WorkerSettings {
	WorkerSettings {
		poll_interval: ctx.config.poll_interval(),
		retry: RetryPolicy::new(ctx.config.backoff_base, ctx.config.max_backoff()),
	}
}

async fn run_worker(ctx: &Context, id: usize) -> anyhow::Result<()> {
	let store = ctx.open_store().await?;
	let shutdown = CancellationToken::new();

	let signal = supervisor::listen_for_shutdown().context("failed to install signal handlers")?;
	let on_signal = shutdown.clone();
	tokio::spawn(async move {
		signal.await;
		tracing::info!("received shutdown signal, finishing current job and exiting");
		on_signal.cancel();
	});

	let worker = Worker::new(
		format!("worker-{id}"),
		store,
		ShellRunner::new(),
		settings(ctx),
		shutdown,
	);
	tracing::info!(worker_id = worker.id(), pid = std::process::id(), "worker process started");

	worker
		.run()
		.await
		.with_context(|| format!("worker-{id} stopped"))?;
	Ok(())
}
