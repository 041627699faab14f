// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for queuectl.
//!
//! This crate provides:
//! - Resolution of the queue home directory and the files inside it
//! - The [`QueueConfig`] value object with its defaults
//! - TOML load/save and key-based `get`/`set` with validation

pub mod error;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use paths::{QueuePaths, HOME_ENV};
pub use settings::{ConfigKey, QueueConfig};

/// Resolve the queue home and load its configuration, creating a default
/// config file on first use.
pub fn load_config(home: Option<&std::path::Path>) -> Result<(QueuePaths, QueueConfig), ConfigError> {
	let paths = QueuePaths::resolve(home)?;
	paths.ensure_home()?;
	let config = QueueConfig::load_or_init(&paths.config_file)?;
	Ok((paths, config))
}
