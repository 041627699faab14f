// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker pool supervision.
//!
//! A pool is N child processes, each running `queuectl worker run`. The
//! foreground supervisor waits on them and forwards SIGINT/SIGTERM. In daemon
//! mode the supervisor itself is spawned detached in a new process group and
//! its pid is written to the pidfile, so `worker stop` can signal the group.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context as _};
use colored::Colorize;
use queuectl_config::QueuePaths;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::commands::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
	Running(u32),
	Stale(u32),
	NotStarted,
}

/// Install SIGINT and SIGTERM handlers now. The returned future resolves
/// when either arrives; a signal delivered before it is first polled is
/// not lost and does not terminate the process.
#[cfg(unix)]
pub fn listen_for_shutdown() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
	use tokio::signal::unix::{signal, SignalKind};

	let mut interrupt = signal(SignalKind::interrupt())?;
	let mut terminate = signal(SignalKind::terminate())?;
	Ok(async move {
		tokio::select! {
			_ = interrupt.recv() => {}
			_ = terminate.recv() => {}
		}
	})
}

#[cfg(not(unix))]
pub fn listen_for_shutdown() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
	Ok(async {
		let _ = tokio::signal::ctrl_c().await;
	})
}

/// Arguments that make a child process see the same queue and logging as us.
fn inherited_args(ctx: &Context) -> Vec<std::ffi::OsString> {
	vec![
		"--home".into(),
		ctx.paths.home.clone().into_os_string(),
		"--log-level".into(),
		ctx.log_level.clone().into(),
		"--log-format".into(),
		ctx.log_format.as_str().into(),
	]
}

/// Run `count` worker processes in the foreground until they all exit.
pub async fn run_pool(ctx: &Context, count: u16) -> anyhow::Result<()> {
	let exe = std::env::current_exe().context("cannot locate queuectl executable")?;
	let signal = listen_for_shutdown().context("failed to install signal handlers")?;
	println!("Starting {count} worker(s) in foreground");

	let (tx, mut rx) = mpsc::channel::<(u16, std::io::Result<ExitStatus>)>(usize::from(count));
	let mut pids = Vec::with_capacity(usize::from(count));

	for id in 1..=count {
		let mut child = Command::new(&exe)
			.args(inherited_args(ctx))
			.args(["worker", "run", "--id", &id.to_string()])
			.stdin(Stdio::null())
			.spawn()
			.with_context(|| format!("failed to spawn worker-{id}"))?;

		let pid = child.id();
		info!(worker_id = id, pid, "spawned worker process");
		pids.extend(pid);

		let tx = tx.clone();
		tokio::spawn(async move {
			let status = child.wait().await;
			let _ = tx.send((id, status)).await;
		});
	}
	drop(tx);

	tokio::pin!(signal);
	let mut signalled = false;
	let mut failures = 0usize;

	loop {
		tokio::select! {
			_ = &mut signal, if !signalled => {
				signalled = true;
				info!(workers = pids.len(), "shutdown requested, stopping workers");
				for pid in &pids {
					terminate(*pid);
				}
			}
			exited = rx.recv() => {
				let Some((id, status)) = exited else { break };
				match status {
					Ok(status) if status.success() => info!(worker_id = id, "worker exited"),
					Ok(status) => {
						failures += 1;
						error!(worker_id = id, %status, "worker exited with failure");
					}
					Err(e) => {
						failures += 1;
						error!(worker_id = id, error = %e, "failed to wait for worker");
					}
				}
			}
		}
	}

	info!("all workers stopped");
	if failures > 0 {
		bail!("{failures} worker(s) exited with failure");
	}
	Ok(())
}

/// Ask a worker to finish its current job and exit.
#[cfg(unix)]
fn terminate(pid: u32) {
	if let Err(e) = unix::send_signal(pid as libc::pid_t, libc::SIGTERM) {
		warn!(pid, error = %e, "failed to signal worker");
	}
}

// Console Ctrl-C already reaches every child.
#[cfg(not(unix))]
fn terminate(_pid: u32) {}

/// Spawn a detached supervisor for `count` workers and record its pid.
#[cfg(unix)]
pub fn start_daemon(ctx: &Context, count: u16) -> anyhow::Result<()> {
	use std::os::unix::process::CommandExt;

	let paths = &ctx.paths;
	match pool_status(paths)? {
		PoolStatus::Running(pid) => {
			bail!(
				"worker pool already running (pid {pid}); stop it first with `queuectl worker stop`"
			)
		}
		PoolStatus::Stale(pid) => {
			warn!(pid, "removing stale pidfile");
			remove_pid(&paths.pid_file)?;
		}
		PoolStatus::NotStarted => {}
	}

	let exe = std::env::current_exe().context("cannot locate queuectl executable")?;
	let log = fs::OpenOptions::new()
		.create(true)
		.append(true)
		.open(&paths.log_file)
		.with_context(|| format!("cannot open log file {}", paths.log_file.display()))?;

	let child = std::process::Command::new(exe)
		.args(inherited_args(ctx))
		.args(["worker", "start", "--count", &count.to_string()])
		.stdin(Stdio::null())
		.stdout(log.try_clone()?)
		.stderr(log)
		.process_group(0)
		.spawn()
		.context("failed to spawn worker pool")?;

	write_pid(&paths.pid_file, child.id())?;
	info!(pid = child.id(), count, "worker pool daemonized");
	println!(
		"Worker pool started as daemon (pid {}, pidfile {}, log {})",
		child.id(),
		paths.pid_file.display(),
		paths.log_file.display()
	);
	Ok(())
}

#[cfg(not(unix))]
pub fn start_daemon(ctx: &Context, count: u16) -> anyhow::Result<()> {
	let _ = (ctx, count);
	bail!("daemon mode is only supported on Unix; run `queuectl worker start` in the foreground")
}

/// Signal the process group recorded in the pidfile and forget it.
#[cfg(unix)]
pub fn stop(paths: &QueuePaths) -> anyhow::Result<()> {
	match pool_status(paths)? {
		PoolStatus::NotStarted => {
			println!("No pidfile found; workers were not started as a daemon or are already stopped");
		}
		PoolStatus::Stale(pid) => {
			remove_pid(&paths.pid_file)?;
			println!("Process {pid} not found; removed stale pidfile");
		}
		PoolStatus::Running(pid) => {
			let group = libc::pid_t::try_from(pid).context("pid out of range")?;
			unix::send_signal(-group, libc::SIGTERM)
				.with_context(|| format!("failed to signal worker pool {pid}"))?;
			remove_pid(&paths.pid_file)?;
			info!(pid, "sent SIGTERM to worker pool");
			println!("{} (pid {pid})", "Sent SIGTERM to worker pool".green());
		}
	}
	Ok(())
}

#[cfg(not(unix))]
pub fn stop(paths: &QueuePaths) -> anyhow::Result<()> {
	let _ = paths;
	bail!("worker stop is only supported on Unix")
}

pub fn pool_status(paths: &QueuePaths) -> anyhow::Result<PoolStatus> {
	let Some(pid) = read_pid(&paths.pid_file)? else {
		return Ok(PoolStatus::NotStarted);
	};
	if process_alive(pid) {
		Ok(PoolStatus::Running(pid))
	} else {
		Ok(PoolStatus::Stale(pid))
	}
}

fn read_pid(path: &Path) -> anyhow::Result<Option<u32>> {
	let contents = match fs::read_to_string(path) {
		Ok(contents) => contents,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e).with_context(|| format!("cannot read {}", path.display())),
	};
	let pid = contents
		.trim()
		.parse::<u32>()
		.with_context(|| format!("pidfile {} does not contain a pid", path.display()))?;
	Ok(Some(pid))
}

fn write_pid(path: &Path, pid: u32) -> anyhow::Result<()> {
	fs::write(path, format!("{pid}\n")).with_context(|| format!("cannot write {}", path.display()))
}

fn remove_pid(path: &Path) -> anyhow::Result<()> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
	}
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
	match libc::pid_t::try_from(pid) {
		Ok(pid) if pid > 0 => match unix::send_signal(pid, 0) {
			Ok(()) => true,
			Err(e) => e.raw_os_error() == Some(libc::EPERM),
		},
		_ => false,
	}
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
	true
}

#[cfg(unix)]
mod unix {
	/// `kill(2)`. A negative `target` addresses a process group.
	pub fn send_signal(target: libc::pid_t, signal: libc::c_int) -> std::io::Result<()> {
		let rc = unsafe { libc::kill(target, signal) };
		if rc == 0 {
			Ok(())
		} else {
			Err(std::io::Error::last_os_error())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pid_roundtrip_and_removal() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queuectl_worker.pid");

		assert_eq!(read_pid(&path).unwrap(), None);
		write_pid(&path, 4242).unwrap();
		assert_eq!(read_pid(&path).unwrap(), Some(4242));
		remove_pid(&path).unwrap();
		assert_eq!(read_pid(&path).unwrap(), None);
		remove_pid(&path).unwrap();
	}

	#[test]
	fn test_garbage_pidfile_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queuectl_worker.pid");
		fs::write(&path, "not-a-pid").unwrap();
		assert!(read_pid(&path).is_err());
	}

	#[test]
	fn test_pool_status_without_pidfile() {
		let dir = tempfile::tempdir().unwrap();
		let paths = QueuePaths::in_dir(dir.path());
		assert_eq!(pool_status(&paths).unwrap(), PoolStatus::NotStarted);
	}

	#[cfg(unix)]
	#[test]
	fn test_pool_status_running_for_live_pid() {
		let dir = tempfile::tempdir().unwrap();
		let paths = QueuePaths::in_dir(dir.path());
		write_pid(&paths.pid_file, std::process::id()).unwrap();
		assert_eq!(
			pool_status(&paths).unwrap(),
			PoolStatus::Running(std::process::id())
		);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_sigterm_before_first_poll_is_caught() {
		let signal = listen_for_shutdown().unwrap();
		assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);

		tokio::time::timeout(std::time::Duration::from_secs(5), signal)
			.await
			.expect("SIGTERM should resolve the shutdown future");
	}

	#[cfg(unix)]
	#[test]
	fn test_stop_removes_stale_pidfile() {
		let dir = tempfile::tempdir().unwrap();
		let paths = QueuePaths::in_dir(dir.path());
		// pid_max on Linux is at most 2^22, so this pid cannot exist.
		write_pid(&paths.pid_file, 99_999_999).unwrap();
		assert_eq!(pool_status(&paths).unwrap(), PoolStatus::Stale(99_999_999));

		stop(&paths).unwrap();
		assert!(!paths.pid_file.exists());
	}
}
