// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;
mod logging;
mod supervisor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{config, dlq, enqueue, list, status, worker, Context};
use logging::LogFormat;

/// queuectl - persistent shell job queue with retrying workers
#[derive(Parser, Debug)]
#[command(name = "queuectl", version)]
struct Args {
	/// Queue home directory holding the database, config and pidfile
	/// (defaults to the current directory)
	#[arg(long, global = true, env = "QUEUECTL_HOME")]
	home: Option<PathBuf>,

	/// Log filter used when RUST_LOG is not set
	#[arg(long, global = true, env = "QUEUECTL_LOG", default_value = "info")]
	log_level: String,

	/// Log output format
	#[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
	log_format: LogFormat,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Add a job to the queue
	Enqueue(enqueue::EnqueueArgs),
	/// Start or stop worker processes
	#[command(subcommand)]
	Worker(worker::WorkerCommand),
	/// Show job counts per state and worker pool info
	Status,
	/// List jobs, optionally filtered by state
	List(list::ListArgs),
	/// Dead letter queue operations
	#[command(subcommand)]
	Dlq(dlq::DlqCommand),
	/// Read or change configuration
	#[command(subcommand)]
	Config(config::ConfigCommand),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	logging::init(&args.log_level, args.log_format);

	let ctx = Context::load(args.home.as_deref(), args.log_level, args.log_format)?;

	match args.command {
		Command::Enqueue(args) => enqueue::run(&ctx, args).await,
		Command::Worker(cmd) => worker::run(&ctx, cmd).await,
		Command::Status => status::run(&ctx).await,
		Command::List(args) => list::run(&ctx, args).await,
		Command::Dlq(cmd) => dlq::run(&ctx, cmd).await,
		Command::Config(cmd) => config::run(&ctx, cmd),
	}
}
