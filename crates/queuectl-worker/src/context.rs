// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Cooperative shutdown request shared between a signal handler and a worker loop.
#[derive(Clone)]
pub struct CancellationToken {
	inner: Arc<Inner>,
}

struct Inner {
	cancelled: AtomicBool,
	notify: Notify,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				cancelled: AtomicBool::new(false),
				notify: Notify::new(),
			}),
		}
	}

	pub fn cancel(&self) {
		self.inner.cancelled.store(true, Ordering::SeqCst);
		self.inner.notify.notify_waiters();
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Resolves once `cancel` has been called.
	pub async fn cancelled(&self) {
		loop {
			let notified = self.inner.notify.notified();
			if self.is_cancelled() {
				return;
			}
			notified.await;
		}
	}

	/// Sleep for `duration`, waking early on cancellation.
	/// Returns `true` if the sleep was cut short.
	pub async fn sleep(&self, duration: Duration) -> bool {
		tokio::select! {
			_ = tokio::time::sleep(duration) => false,
			_ = self.cancelled() => true,
		}
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}
