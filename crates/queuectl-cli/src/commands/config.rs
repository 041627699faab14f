// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use queuectl_config::ConfigKey;

use super::Context;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum ConfigCommand {
	/// Print one setting, or all of them
	Get {
		/// max_retries, backoff_base, poll_interval_ms or max_backoff_secs
		key: Option<String>,
	},
	/// Change a setting
	Set {
		/// max_retries, backoff_base, poll_interval_ms or max_backoff_secs
		key: String,
		value: String,
	},
}

pub fn run(ctx: &Context, cmd: ConfigCommand) -> anyhow::Result<()> {
	match cmd {
		ConfigCommand::Get { key: Some(key) } => {
			let key: ConfigKey = key.parse()?;
			println!("{key} = {}", ctx.config.get(key));
		}
		ConfigCommand::Get { key: None } => {
			for (key, value) in ctx.config.entries() {
				println!("{key} = {value}");
			}
		}
		ConfigCommand::Set { key, value } => {
			let key: ConfigKey = key.parse()?;
			let mut config = ctx.config.clone();
			config.set(key, &value)?;
			config.save(&ctx.paths.config_file)?;
			tracing::info!(%key, value = %config.get(key), "configuration updated");
			println!("Set config {key} = {}", config.get(key));
		}
	}
	Ok(())
}
