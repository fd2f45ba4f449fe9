//! Whole-session behaviour in local mode, against a fake transfer tool
//! that applies filter rules the way rsync does

mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::*;
use pairsync::channel::LocalShell;
use pairsync::exclusion::FilterRule;
use pairsync::lock::FixedProbe;
use pairsync::transfer::Phase;
use pairsync::utils::ShutdownSignal;
use pairsync::{Collaborators, Config, Session, SessionConfig, SyncError};

struct Replicas {
	local: TempDir,
	remote: TempDir,
}

impl Replicas {
	fn new() -> Self {
		Replicas { local: TempDir::new().unwrap(), remote: TempDir::new().unwrap() }
	}

	/// Both sides holding `paths`, with a committed snapshot of them
	async fn synced(paths: &[&str]) -> Self {
		let replicas = Replicas::new();
		for path in paths {
			write(replicas.local.path(), path, path);
		}
		let transfer = Arc::new(DirTransfer::default());
		replicas.session(transfer).run().await.unwrap();
		replicas
	}

	fn session(&self, transfer: Arc<dyn pairsync::transfer::Transfer>) -> Session {
		session(self.local.path(), self.remote.path(), transfer)
	}

	fn assert_unlocked(&self) {
		assert!(!lock_file(self.local.path()).exists(), "local lock left behind");
		assert!(!remote_lock(self.remote.path()).exists(), "remote lock left behind");
	}
}

#[tokio::test]
async fn test_first_sync_merges_both_sides() {
	let replicas = Replicas::new();
	write(replicas.local.path(), "mine.txt", "local");
	write(replicas.remote.path(), "docs/theirs.txt", "remote");

	let transfer = Arc::new(DirTransfer::default());
	let report = replicas.session(transfer.clone()).run().await.unwrap();

	let expected = vec!["docs", "docs/theirs.txt", "mine.txt"];
	assert_eq!(tree(replicas.local.path()), expected);
	assert_eq!(tree(replicas.remote.path()), expected);
	assert_eq!(transfer.phases(), vec![Phase::Incoming, Phase::Outgoing]);
	assert!(report.first_run);
	assert_eq!(report.protected_from_delete, 0);
	assert_eq!(report.committed_paths, 3);
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), "docs\ndocs/theirs.txt\nmine.txt\n");
	assert!(!replicas.local.path().join(".pairsync/tree-current").exists());
	replicas.assert_unlocked();
}

#[tokio::test]
async fn test_first_sync_deletes_nothing_and_needs_no_rules() {
	let replicas = Replicas::new();
	for i in 0..50 {
		write(replicas.local.path(), &format!("local/{}", i), "l");
	}
	write(replicas.remote.path(), "remote-only", "r");

	let transfer = Arc::new(DirTransfer::default());
	replicas.session(transfer.clone()).run().await.unwrap();

	for request in transfer.requests() {
		assert!(!request.delete, "{} phase deletes on first sync", request.phase);
		assert_eq!(request.rules, vec![FilterRule::exclude(".pairsync")]);
	}
	assert!(replicas.local.path().join("remote-only").is_file());
	assert!(replicas.remote.path().join("local/49").is_file());
}

#[tokio::test]
async fn test_empty_previous_tree_is_not_a_first_sync() {
	let replicas = Replicas::synced(&[]).await;
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), "");
	write(replicas.local.path(), "new", "n");

	let transfer = Arc::new(DirTransfer::default());
	let report = replicas.session(transfer.clone()).run().await.unwrap();

	assert!(!report.first_run);
	assert!(transfer.requests().iter().all(|r| r.delete && r.protects("new")));
}

#[tokio::test]
async fn test_local_delete_and_create_drive_the_rules() {
	let replicas = Replicas::synced(&["a", "b", "c"]).await;
	fs::remove_file(replicas.local.path().join("b")).unwrap();
	write(replicas.local.path(), "d", "new");

	let transfer = Arc::new(DirTransfer::default());
	let report = replicas.session(transfer.clone()).run().await.unwrap();

	let requests = transfer.requests();
	assert_eq!(requests.len(), 2);
	let (incoming, outgoing) = (&requests[0], &requests[1]);
	assert_eq!(
		incoming.rules,
		vec![FilterRule::exclude(".pairsync"), FilterRule::exclude("b"), FilterRule::protect("d")]
	);
	assert_eq!(outgoing.rules, vec![FilterRule::exclude(".pairsync"), FilterRule::protect("d")]);
	assert!(incoming.delete && outgoing.delete);
	assert_eq!(report.hidden_from_incoming, 1);
	assert_eq!(report.protected_from_delete, 1);

	assert_eq!(tree(replicas.local.path()), vec!["a", "c", "d"]);
	assert_eq!(tree(replicas.remote.path()), vec!["a", "c", "d"]);
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), "a\nc\nd\n");
}

#[tokio::test]
async fn test_remote_changes_reach_local() {
	let replicas = Replicas::synced(&["keep", "gone"]).await;
	fs::remove_file(replicas.remote.path().join("gone")).unwrap();
	write(replicas.remote.path(), "arrived", "remote");
	write(replicas.remote.path(), "keep", "edited remotely");

	let transfer = Arc::new(DirTransfer::default());
	let report = replicas.session(transfer).run().await.unwrap();

	assert_eq!(tree(replicas.local.path()), vec!["arrived", "keep"]);
	assert_eq!(fs::read_to_string(replicas.local.path().join("keep")).unwrap(), "edited remotely");
	assert_eq!(report.transfers.incoming.deleted, 1);
	// Arrivals of this session are known paths for the next one
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), "arrived\nkeep\n");
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
	let replicas = Replicas::synced(&["x/1", "x/2", "y"]).await;
	let before = previous_tree(replicas.local.path()).unwrap();

	let transfer = Arc::new(DirTransfer::default());
	let report = replicas.session(transfer.clone()).run().await.unwrap();

	assert_eq!(previous_tree(replicas.local.path()).unwrap(), before);
	for request in transfer.requests() {
		assert_eq!(request.rules, vec![FilterRule::exclude(".pairsync")]);
	}
	assert_eq!(report.hidden_from_incoming, 0);
	assert_eq!(report.protected_from_delete, 0);
	assert_eq!(report.transfers.incoming.transferred + report.transfers.outgoing.transferred, 0);
}

#[tokio::test]
async fn test_incoming_failure_skips_outgoing_and_commit() {
	let replicas = Replicas::synced(&["a", "b"]).await;
	let before = previous_tree(replicas.local.path()).unwrap();
	write(replicas.local.path(), "c", "new");

	let transfer = Arc::new(FailingTransfer::new(Phase::Incoming));
	let err = replicas.session(transfer.clone()).run().await.unwrap_err();

	assert!(matches!(err, SyncError::TransferFailure { phase: Phase::Incoming, .. }));
	assert_eq!(err.exit_code(), 128);
	assert_eq!(transfer.phases(), vec![Phase::Incoming]);
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), before);
	replicas.assert_unlocked();
}

#[tokio::test]
async fn test_outgoing_failure_keeps_previous_snapshot() {
	let replicas = Replicas::synced(&["a"]).await;
	let before = previous_tree(replicas.local.path()).unwrap();
	write(replicas.local.path(), "b", "new");

	let transfer = Arc::new(FailingTransfer::new(Phase::Outgoing));
	let err = replicas.session(transfer.clone()).run().await.unwrap_err();

	assert!(matches!(err, SyncError::TransferFailure { phase: Phase::Outgoing, .. }));
	assert_eq!(transfer.phases(), vec![Phase::Incoming, Phase::Outgoing]);
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), before);
	replicas.assert_unlocked();

	// The retry still sees b as a local creation
	let retry = Arc::new(DirTransfer::default());
	replicas.session(retry.clone()).run().await.unwrap();
	assert!(retry.requests()[0].protects("b"));
}

#[tokio::test]
async fn test_stale_lock_never_touches_remote() {
	let replicas = Replicas::new();
	write(replicas.local.path(), ".pairsync/tmp/lock", "4242\n");
	let channel = Arc::new(RecordingChannel::default());
	let transfer = Arc::new(DirTransfer::default());

	let session = session_with(
		replicas.local.path(),
		replicas.remote.path(),
		channel.clone(),
		transfer.clone(),
		Arc::new(FixedProbe(false)),
		Arc::new(CountingHooks::default()),
	);
	let err = session.run().await.unwrap_err();

	assert!(matches!(err, SyncError::StaleLock { pid: Some(4242), .. }));
	assert_eq!(err.exit_code(), 2);
	assert!(channel.commands().is_empty());
	assert!(transfer.requests().is_empty());
	// The stale file is left for the operator
	assert!(lock_file(replicas.local.path()).exists());
}

#[tokio::test]
async fn test_live_lock_owner_means_already_running() {
	let replicas = Replicas::new();
	write(replicas.local.path(), ".pairsync/tmp/lock", "4242\n");

	let err = replicas.session(Arc::new(DirTransfer::default())).run().await.unwrap_err();

	assert!(matches!(err, SyncError::AlreadyRunning { pid: 4242, .. }));
	assert_eq!(err.exit_code(), 1);
	assert_eq!(fs::read_to_string(lock_file(replicas.local.path())).unwrap(), "4242\n");
}

#[tokio::test]
async fn test_remote_lock_busy_releases_local_lock() {
	let replicas = Replicas::new();
	fs::create_dir_all(remote_lock(replicas.remote.path())).unwrap();
	let transfer = Arc::new(DirTransfer::default());

	let err = replicas.session(transfer.clone()).run().await.unwrap_err();

	assert!(matches!(err, SyncError::RemoteLockBusy { .. }));
	assert_eq!(err.exit_code(), 3);
	assert!(transfer.requests().is_empty());
	assert!(!lock_file(replicas.local.path()).exists());
	// Someone else's marker stays
	assert!(remote_lock(replicas.remote.path()).is_dir());
}

#[tokio::test]
async fn test_unreachable_remote_is_a_busy_lock() {
	let replicas = Replicas::new();
	let session = session_with(
		replicas.local.path(),
		replicas.remote.path(),
		Arc::new(UnreachableChannel),
		Arc::new(DirTransfer::default()),
		Arc::new(FixedProbe(true)),
		Arc::new(CountingHooks::default()),
	);

	let err = session.run().await.unwrap_err();

	match err {
		SyncError::RemoteLockBusy { message } => assert!(message.contains("Connection refused")),
		other => panic!("unexpected error: {:?}", other),
	}
	assert!(!lock_file(replicas.local.path()).exists());
}

#[tokio::test]
async fn test_concurrent_sessions_are_exclusive() {
	let replicas = Replicas::new();
	let other_local = TempDir::new().unwrap();
	write(replicas.local.path(), "a", "a");

	let gated = Arc::new(GatedTransfer::new());
	let first = replicas.session(gated.clone());
	let running = tokio::spawn(async move { first.run().await });
	gated.reached.notified().await;

	// Same local replica
	let same_local = Arc::new(DirTransfer::default());
	let err = replicas.session(same_local.clone()).run().await.unwrap_err();
	assert!(matches!(err, SyncError::AlreadyRunning { .. }));

	// Same remote replica from another local one
	let same_remote = Arc::new(DirTransfer::default());
	let err = session(other_local.path(), replicas.remote.path(), same_remote.clone())
		.run()
		.await
		.unwrap_err();
	assert!(matches!(err, SyncError::RemoteLockBusy { .. }));
	assert!(!lock_file(other_local.path()).exists());

	gated.release.notify_one();
	running.await.unwrap().unwrap();

	assert_eq!(gated.entered.load(Ordering::SeqCst), 1);
	assert!(same_local.requests().is_empty());
	assert!(same_remote.requests().is_empty());
	assert_eq!(tree(replicas.remote.path()), vec!["a"]);
	replicas.assert_unlocked();
}

#[tokio::test]
async fn test_interrupt_during_transfer_releases_locks() {
	let replicas = Replicas::synced(&["a"]).await;
	let before = previous_tree(replicas.local.path()).unwrap();
	let gated = Arc::new(GatedTransfer::new());
	let reached = gated.reached.clone();
	let session = replicas.session(gated.clone());

	let err = session
		.run_until(async move {
			reached.notified().await;
			ShutdownSignal::Interrupt
		})
		.await
		.unwrap_err();

	assert!(matches!(err, SyncError::Interrupted { signal: 2 }));
	assert_eq!(err.exit_code(), 130);
	assert_eq!(gated.entered.load(Ordering::SeqCst), 1);
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), before);
	replicas.assert_unlocked();
}

#[tokio::test]
async fn test_signal_while_locking_is_cleaned_up() {
	let replicas = Replicas::synced(&["a"]).await;
	let before = previous_tree(replicas.local.path()).unwrap();
	let transfer = Arc::new(DirTransfer::default());
	let session = replicas.session(transfer.clone());

	// Already delivered when the locks are taken
	let err = session.run_until(async { ShutdownSignal::Terminate }).await.unwrap_err();

	assert!(matches!(err, SyncError::Interrupted { signal: 15 }));
	assert_eq!(err.exit_code(), 143);
	assert!(transfer.requests().is_empty());
	assert_eq!(previous_tree(replicas.local.path()).unwrap(), before);
	replicas.assert_unlocked();
}

#[tokio::test]
async fn test_slow_session_runs_both_hooks() {
	let replicas = Replicas::new();
	let hooks = Arc::new(CountingHooks::default());
	let gated = Arc::new(GatedTransfer::new());

	let mut config = Config::new("", replicas.remote.path().to_str().unwrap());
	config.slow_sync_time = 1;
	let session = Session::new(
		Arc::new(SessionConfig::new(replicas.local.path(), config)),
		Collaborators {
			channel: Arc::new(LocalShell),
			transfer: gated.clone(),
			probe: Arc::new(FixedProbe(true)),
			hooks: hooks.clone(),
		},
	);

	let release = gated.release.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(1500)).await;
		release.notify_one();
	});
	let report = session.run().await.unwrap();

	assert!(report.slow);
	assert_eq!(hooks.counts(), (1, 1));
}

#[tokio::test]
async fn test_fast_session_runs_no_hooks() {
	let replicas = Replicas::new();
	let hooks = Arc::new(CountingHooks::default());
	let session = session_with(
		replicas.local.path(),
		replicas.remote.path(),
		Arc::new(LocalShell),
		Arc::new(DirTransfer::default()),
		Arc::new(FixedProbe(true)),
		hooks.clone(),
	);

	let report = session.run().await.unwrap();

	assert!(!report.slow);
	assert_eq!(hooks.counts(), (0, 0));
}

// vim: ts=4
