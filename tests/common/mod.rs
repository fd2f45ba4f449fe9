//! Shared fakes for session tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use pairsync::channel::{CommandOutput, LocalShell, RemoteChannel};
use pairsync::error::ChannelError;
use pairsync::lock::{FixedProbe, ProcessProbe};
use pairsync::notifier::SlowSyncHooks;
use pairsync::transfer::{ChangeKind, ItemizedChange, Phase, Transfer, TransferRequest, TransferStatus};
use pairsync::{Collaborators, Config, Session, SessionConfig, Snapshot};

/// The path itself and every parent directory of it
fn with_ancestors(path: &str) -> Vec<&str> {
	let mut all = vec![path];
	for (i, c) in path.char_indices() {
		if c == '/' {
			all.push(&path[..i]);
		}
	}
	all
}

fn scan(dir: &Path) -> io::Result<Snapshot> {
	Snapshot::scan(dir, "").map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Local directory to local directory transfer honouring filter rules the
/// way rsync does: excluded paths are neither copied nor deleted, protected
/// paths are copied but never deleted
#[derive(Default)]
pub struct DirTransfer {
	pub requests: Mutex<Vec<TransferRequest>>,
}

impl DirTransfer {
	pub fn requests(&self) -> Vec<TransferRequest> {
		self.requests.lock().unwrap().clone()
	}

	pub fn phases(&self) -> Vec<Phase> {
		self.requests().iter().map(|r| r.phase).collect()
	}
}

#[async_trait]
impl Transfer for DirTransfer {
	async fn transfer(&self, request: &TransferRequest) -> io::Result<TransferStatus> {
		self.requests.lock().unwrap().push(request.clone());

		let src = PathBuf::from(request.source.trim_end_matches('/'));
		let dst = PathBuf::from(request.destination.trim_end_matches('/'));
		let hidden = |p: &str| with_ancestors(p).into_iter().any(|a| request.excludes(a));
		let protected = |p: &str| with_ancestors(p).into_iter().any(|a| request.protects(a));

		let src_tree = scan(&src)?;
		let dst_tree = scan(&dst)?;
		let mut changes = Vec::new();

		for path in src_tree.paths() {
			if hidden(path) {
				continue;
			}
			let (from, to) = (src.join(path), dst.join(path));
			if from.is_dir() {
				fs::create_dir_all(&to)?;
			} else if fs::read(&from).ok() != fs::read(&to).ok() {
				if let Some(parent) = to.parent() {
					fs::create_dir_all(parent)?;
				}
				fs::copy(&from, &to)?;
				changes.push(ItemizedChange { kind: ChangeKind::Transferred, path: path.clone() });
			}
		}

		if request.delete {
			for path in dst_tree.paths().iter().rev() {
				if src_tree.contains(path) || hidden(path) || protected(path) {
					continue;
				}
				let target = dst.join(path);
				let removed = if target.is_dir() { fs::remove_dir_all(&target) } else { fs::remove_file(&target) };
				match removed {
					Ok(()) => changes.push(ItemizedChange { kind: ChangeKind::Deleted, path: path.clone() }),
					Err(e) if e.kind() == io::ErrorKind::NotFound => {}
					Err(e) => return Err(e),
				}
			}
		}

		Ok(TransferStatus { code: Some(0), changes })
	}
}

/// Fails the given phase with exit code 23, records everything it sees
pub struct FailingTransfer {
	pub fail: Phase,
	pub phases: Mutex<Vec<Phase>>,
}

impl FailingTransfer {
	pub fn new(fail: Phase) -> Self {
		FailingTransfer { fail, phases: Mutex::new(Vec::new()) }
	}

	pub fn phases(&self) -> Vec<Phase> {
		self.phases.lock().unwrap().clone()
	}
}

#[async_trait]
impl Transfer for FailingTransfer {
	async fn transfer(&self, request: &TransferRequest) -> io::Result<TransferStatus> {
		self.phases.lock().unwrap().push(request.phase);
		let code = if request.phase == self.fail { 23 } else { 0 };
		Ok(TransferStatus { code: Some(code), changes: vec![] })
	}
}

/// Holds the incoming phase until released
pub struct GatedTransfer {
	pub inner: DirTransfer,
	pub reached: Arc<Notify>,
	pub release: Arc<Notify>,
	pub entered: AtomicUsize,
}

impl GatedTransfer {
	pub fn new() -> Self {
		GatedTransfer {
			inner: DirTransfer::default(),
			reached: Arc::new(Notify::new()),
			release: Arc::new(Notify::new()),
			entered: AtomicUsize::new(0),
		}
	}
}

#[async_trait]
impl Transfer for GatedTransfer {
	async fn transfer(&self, request: &TransferRequest) -> io::Result<TransferStatus> {
		if request.phase == Phase::Incoming {
			self.entered.fetch_add(1, Ordering::SeqCst);
			self.reached.notify_one();
			self.release.notified().await;
		}
		self.inner.transfer(request).await
	}
}

/// Channel that records commands and answers through a real local shell
#[derive(Default)]
pub struct RecordingChannel {
	pub commands: Mutex<Vec<String>>,
}

impl RecordingChannel {
	pub fn commands(&self) -> Vec<String> {
		self.commands.lock().unwrap().clone()
	}
}

#[async_trait]
impl RemoteChannel for RecordingChannel {
	async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
		self.commands.lock().unwrap().push(command.to_string());
		LocalShell.execute(command).await
	}

	fn describe(&self) -> String {
		"recording shell".to_string()
	}
}

/// Channel whose host is unreachable
pub struct UnreachableChannel;

#[async_trait]
impl RemoteChannel for UnreachableChannel {
	async fn execute(&self, _command: &str) -> Result<CommandOutput, ChannelError> {
		Ok(CommandOutput {
			status: Some(255),
			stdout: String::new(),
			stderr: "ssh: connect to host box port 22: Connection refused".to_string(),
		})
	}

	fn describe(&self) -> String {
		"ssh box".to_string()
	}
}

#[derive(Default)]
pub struct CountingHooks {
	pub started: AtomicUsize,
	pub finished: AtomicUsize,
}

impl CountingHooks {
	pub fn counts(&self) -> (usize, usize) {
		(self.started.load(Ordering::SeqCst), self.finished.load(Ordering::SeqCst))
	}
}

#[async_trait]
impl SlowSyncHooks for CountingHooks {
	async fn slow_sync_started(&self) {
		self.started.fetch_add(1, Ordering::SeqCst);
	}

	async fn slow_sync_finished(&self) {
		self.finished.fetch_add(1, Ordering::SeqCst);
	}
}

/// Session in local mode between `local` and `remote`
pub fn session_with(
	local: &Path,
	remote: &Path,
	channel: Arc<dyn RemoteChannel>,
	transfer: Arc<dyn Transfer>,
	probe: Arc<dyn ProcessProbe>,
	hooks: Arc<dyn SlowSyncHooks>,
) -> Session {
	let mut config = Config::new("", remote.to_str().unwrap());
	config.slow_sync_time = 30;
	let session_config = Arc::new(SessionConfig::new(local, config));
	Session::new(session_config, Collaborators { channel, transfer, probe, hooks })
}

/// Session with a real local shell, live-owner probe and counting hooks
pub fn session(local: &Path, remote: &Path, transfer: Arc<dyn Transfer>) -> Session {
	session_with(
		local,
		remote,
		Arc::new(LocalShell),
		transfer,
		Arc::new(FixedProbe(true)),
		Arc::new(CountingHooks::default()),
	)
}

pub fn write(root: &Path, path: &str, content: &str) {
	let path = root.join(path);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

/// Relative paths of a replica, without its control directory
pub fn tree(root: &Path) -> Vec<String> {
	Snapshot::scan(root, ".pairsync").unwrap().paths().to_vec()
}

pub fn lock_file(local: &Path) -> PathBuf {
	local.join(".pairsync/tmp/lock")
}

pub fn remote_lock(remote: &Path) -> PathBuf {
	remote.join(".pairsync/lock")
}

pub fn previous_tree(local: &Path) -> Option<String> {
	fs::read_to_string(local.join(".pairsync/tree-previous")).ok()
}

// vim: ts=4
