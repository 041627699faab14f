// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
	/// The job goes back to `failed` and any worker may claim it again.
	Retry,
	/// Retry budget exhausted; the job goes to `dead`.
	DeadLetter,
}

/// Pacing between a retryable failure and the worker's next poll.
///
/// The delay is not a per-job schedule: the failed job is eligible again
/// immediately, this only slows down the worker that saw the failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	backoff_base: f64,
	max_delay: Duration,
}

impl RetryPolicy {
	pub fn new(backoff_base: f64, max_delay: Duration) -> Self {
		Self {
			backoff_base,
			max_delay,
		}
	}

	pub fn backoff_base(&self) -> f64 {
		self.backoff_base
	}

	pub fn max_delay(&self) -> Duration {
		self.max_delay
	}

	/// `backoff_base ^ attempts` seconds, capped at `max_delay`.
	pub fn delay(&self, attempts_after_failure: u32) -> Duration {
		let exponent = i32::try_from(attempts_after_failure).unwrap_or(i32::MAX);
		let secs = self.backoff_base.powi(exponent);
		if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
			return self.max_delay;
		}
		if secs <= 0.0 {
			return Duration::ZERO;
		}
		Duration::from_secs_f64(secs)
	}

	pub fn decide(&self, attempts_after_failure: u32, max_retries: u32) -> RetryDecision {
		if attempts_after_failure >= max_retries {
			RetryDecision::DeadLetter
		} else {
			RetryDecision::Retry
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_BACKOFF_BASE, DEFAULT_MAX_DELAY)
	}
}
