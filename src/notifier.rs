//! Slow-sync notification
//!
//! A background task waits for the session to finish. If that takes longer
//! than the threshold it runs the start hook once; when the session finishes
//! the stop hook follows. The task is always joined, and killing it drops any
//! running hook, which takes the hook's process group down with it.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::logging::*;
use crate::utils::GroupChild;

/// How long `finish` waits for a running start hook before killing it
pub const FINISH_GRACE: Duration = Duration::from_secs(2);

/// Side effects of a slow session
#[async_trait]
pub trait SlowSyncHooks: Send + Sync {
	/// The session crossed the threshold
	async fn slow_sync_started(&self);

	/// A slow session has finished
	async fn slow_sync_finished(&self);
}

/// Hooks running the configured shell commands
#[derive(Debug, Clone, Default)]
pub struct CommandHooks {
	start_cmd: Option<String>,
	stop_cmd: Option<String>,
}

impl CommandHooks {
	pub fn new(config: &Config) -> Self {
		CommandHooks {
			start_cmd: config.slow_sync_start_cmd.clone(),
			stop_cmd: config.slow_sync_stop_cmd.clone(),
		}
	}

	async fn run(command: &str) {
		let mut child = match GroupChild::spawn_shell(command) {
			Ok(child) => child,
			Err(e) => {
				warn!("Failed to run '{}': {}", command, e);
				return;
			}
		};
		match child.wait().await {
			Ok(status) if status.success() => {}
			Ok(status) => warn!("'{}' exited with {}", command, status),
			Err(e) => warn!("Failed to wait for '{}': {}", command, e),
		}
	}
}

#[async_trait]
impl SlowSyncHooks for CommandHooks {
	async fn slow_sync_started(&self) {
		if let Some(cmd) = &self.start_cmd {
			CommandHooks::run(cmd).await;
		}
	}

	async fn slow_sync_finished(&self) {
		if let Some(cmd) = &self.stop_cmd {
			CommandHooks::run(cmd).await;
		}
	}
}

/// Starts the notifier task
pub struct SlowSyncNotifier;

impl SlowSyncNotifier {
	pub fn start(threshold: Duration, hooks: Arc<dyn SlowSyncHooks>) -> NotifierHandle {
		let (done_tx, done_rx) = oneshot::channel();
		let slow = Arc::new(AtomicBool::new(false));
		let task = tokio::spawn(watch(threshold, hooks.clone(), slow.clone(), done_rx));
		NotifierHandle { done: Some(done_tx), task, slow, hooks }
	}
}

async fn watch(
	threshold: Duration,
	hooks: Arc<dyn SlowSyncHooks>,
	slow: Arc<AtomicBool>,
	mut done: oneshot::Receiver<()>,
) {
	tokio::select! {
		_ = &mut done => return,
		_ = tokio::time::sleep(threshold) => {}
	}
	slow.store(true, Ordering::SeqCst);
	info!("Sync is taking longer than {}s", threshold.as_secs());
	hooks.slow_sync_started().await;
	let _ = done.await;
}

/// Running notifier; must be finished or killed
pub struct NotifierHandle {
	done: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
	slow: Arc<AtomicBool>,
	hooks: Arc<dyn SlowSyncHooks>,
}

impl NotifierHandle {
	pub fn is_slow(&self) -> bool {
		self.slow.load(Ordering::SeqCst)
	}

	/// Stop after a completed session; returns whether it was slow
	pub async fn finish(mut self) -> bool {
		if let Some(done) = self.done.take() {
			let _ = done.send(());
		}
		if tokio::time::timeout(FINISH_GRACE, &mut self.task).await.is_err() {
			debug!("Start hook still running, killing it");
			self.task.abort();
			let _ = (&mut self.task).await;
		}

		let slow = self.is_slow();
		if slow {
			info!("Slow sync finished");
			self.hooks.slow_sync_finished().await;
		}
		slow
	}

	/// Stop after a failed session, without the finish hook
	pub async fn kill(mut self) {
		self.done.take();
		self.task.abort();
		let _ = (&mut self.task).await;
	}
}

impl Drop for NotifierHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}


// vim: ts=4
