// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The queue's tunable settings and their on-disk TOML form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::ConfigError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 5;

/// Loaded once by the CLI and handed to the store and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
	/// Retry budget given to jobs that do not specify their own.
	pub max_retries: u32,
	/// Base of the exponential pause after a failed attempt.
	pub backoff_base: f64,
	/// Idle wait between polls of an empty queue.
	pub poll_interval_ms: u64,
	/// Upper bound on the pause after a failed attempt.
	pub max_backoff_secs: u64,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			backoff_base: DEFAULT_BACKOFF_BASE,
			poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
			max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
		}
	}
}

/// Keys accepted by `config get` and `config set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
	MaxRetries,
	BackoffBase,
	PollIntervalMs,
	MaxBackoffSecs,
}

impl ConfigKey {
	pub const ALL: [ConfigKey; 4] = [
		ConfigKey::MaxRetries,
		ConfigKey::BackoffBase,
		ConfigKey::PollIntervalMs,
		ConfigKey::MaxBackoffSecs,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ConfigKey::MaxRetries => "max_retries",
			ConfigKey::BackoffBase => "backoff_base",
			ConfigKey::PollIntervalMs => "poll_interval_ms",
			ConfigKey::MaxBackoffSecs => "max_backoff_secs",
		}
	}
}

impl fmt::Display for ConfigKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ConfigKey {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ConfigKey::ALL
			.into_iter()
			.find(|key| key.as_str() == s)
			.ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
	}
}

impl QueueConfig {
	/// Read the config file, writing the defaults first if it does not exist.
	pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
		if !path.exists() {
			let config = Self::default();
			config.save(path)?;
			tracing::info!(path = %path.display(), "wrote default configuration");
			return Ok(config);
		}
		Self::load(path)
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})?;
		config.validate()?;
		tracing::debug!(path = %path.display(), ?config, "loaded configuration");
		Ok(config)
	}

	pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
		self.validate()?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let contents = toml::to_string_pretty(self)?;
		std::fs::write(path, contents)?;
		Ok(())
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
			return Err(ConfigError::invalid_value(
				ConfigKey::BackoffBase.as_str(),
				format!("must be a finite number >= 1, got {}", self.backoff_base),
			));
		}
		if self.poll_interval_ms == 0 {
			return Err(ConfigError::invalid_value(
				ConfigKey::PollIntervalMs.as_str(),
				"must be greater than zero",
			));
		}
		Ok(())
	}

	pub fn get(&self, key: ConfigKey) -> String {
		match key {
			ConfigKey::MaxRetries => self.max_retries.to_string(),
			ConfigKey::BackoffBase => self.backoff_base.to_string(),
			ConfigKey::PollIntervalMs => self.poll_interval_ms.to_string(),
			ConfigKey::MaxBackoffSecs => self.max_backoff_secs.to_string(),
		}
	}

	/// Parse `value` for `key` and apply it. The config is left unchanged on error.
	pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
		let mut updated = self.clone();
		match key {
			ConfigKey::MaxRetries => updated.max_retries = parse_value(key, value)?,
			ConfigKey::BackoffBase => updated.backoff_base = parse_value(key, value)?,
			ConfigKey::PollIntervalMs => updated.poll_interval_ms = parse_value(key, value)?,
			ConfigKey::MaxBackoffSecs => updated.max_backoff_secs = parse_value(key, value)?,
		}
		updated.validate()?;
		*self = updated;
		Ok(())
	}

	/// Every key with its current value, in a stable order.
	pub fn entries(&self) -> Vec<(ConfigKey, String)> {
		ConfigKey::ALL
			.into_iter()
			.map(|key| (key, self.get(key)))
			.collect()
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn max_backoff(&self) -> Duration {
		Duration::from_secs(self.max_backoff_secs)
	}
}

fn parse_value<T>(key: ConfigKey, value: &str) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: fmt::Display,
{
	value
		.trim()
		.parse()
		.map_err(|e: T::Err| ConfigError::invalid_value(key.as_str(), e.to_string()))
}
