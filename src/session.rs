//! One sync session
//!
//! lock → snapshot → diff → notifier → incoming → outgoing → commit → unlock
//!
//! The previous snapshot is only replaced after both transfers succeeded, so
//! any failure leaves the next session to diff against the last good state.

use std::fs;
use std::future::Future;
use std::sync::Arc;

use crate::channel::{self, RemoteChannel};
use crate::cleanup;
use crate::config::{SessionConfig, CONTROL_DIR};
use crate::error::SyncError;
use crate::exclusion::Exclusions;
use crate::lock::{LockCoordinator, ProcessProbe, SystemProbe};
use crate::logging::*;
use crate::notifier::{CommandHooks, SlowSyncHooks, SlowSyncNotifier};
use crate::orchestrator::{DeleteMode, TransferOrchestrator, TransferReport};
use crate::snapshot::Snapshot;
use crate::transfer::{RsyncTransfer, Transfer};
use crate::utils::ShutdownSignal;

/// External collaborators of a session
#[derive(Clone)]
pub struct Collaborators {
	pub channel: Arc<dyn RemoteChannel>,
	pub transfer: Arc<dyn Transfer>,
	pub probe: Arc<dyn ProcessProbe>,
	pub hooks: Arc<dyn SlowSyncHooks>,
}

impl Collaborators {
	/// ssh or local shell, rsync, `kill(pid, 0)` and the configured hooks
	pub fn system(session: &SessionConfig) -> Self {
		Collaborators {
			channel: channel::from_config(&session.config),
			transfer: Arc::new(RsyncTransfer::new(session)),
			probe: Arc::new(SystemProbe),
			hooks: Arc::new(CommandHooks::new(&session.config)),
		}
	}
}

/// Outcome of a successful session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub transfers: TransferReport,

	/// No previous snapshot existed; nothing was deleted
	pub first_run: bool,

	/// Paths deleted locally, kept from being fetched back
	pub hidden_from_incoming: usize,

	/// Paths created locally, kept from being deleted
	pub protected_from_delete: usize,

	/// Entries in the committed snapshot
	pub committed_paths: usize,

	/// Whether the slow-sync notification fired
	pub slow: bool,
}

pub struct Session {
	config: Arc<SessionConfig>,
	parts: Collaborators,
}

impl Session {
	pub fn new(config: Arc<SessionConfig>, parts: Collaborators) -> Self {
		Session { config, parts }
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Run one session to completion
	pub async fn run(&self) -> Result<SyncReport, SyncError> {
		self.run_until(std::future::pending()).await
	}

	/// Run one session; `shutdown` resolving once the locks are held aborts
	/// it through the regular failure path
	///
	/// The remote lock call is never cut short: a dropped `mkdir` could leave
	/// a marker behind that no one releases. A signal that arrives meanwhile
	/// is acted on as soon as it returns.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<SyncReport, SyncError>
	where
		F: Future<Output = ShutdownSignal>,
	{
		tokio::pin!(shutdown);
		let coordinator =
			LockCoordinator::new(&self.config, self.parts.channel.clone(), self.parts.probe.clone());
		let locks = coordinator.acquire().await?;
		if let Some(signal) = pending_signal(&mut shutdown).await {
			return Err(cleanup::abort_session(locks, None, signal.into()).await);
		}

		let (exclusions, mode) = match self.prepare() {
			Ok(plan) => plan,
			Err(e) => return Err(cleanup::abort_session(locks, None, e).await),
		};
		if let Some(signal) = pending_signal(&mut shutdown).await {
			return Err(cleanup::abort_session(locks, None, signal.into()).await);
		}

		let notifier = SlowSyncNotifier::start(
			self.config.config.slow_sync_threshold(),
			self.parts.hooks.clone(),
		);
		let orchestrator = TransferOrchestrator::new(&self.config, self.parts.transfer.as_ref());

		let outcome = tokio::select! {
			biased;
			signal = &mut shutdown => Err(SyncError::from(signal)),
			result = orchestrator.run(&exclusions, mode) => result,
		};
		let transfers = match outcome {
			Ok(transfers) => transfers,
			Err(e) => return Err(cleanup::abort_session(locks, Some(notifier), e).await),
		};
		let slow = notifier.finish().await;

		let committed_paths = match self.commit() {
			Ok(len) => len,
			Err(e) => return Err(cleanup::abort_session(locks, None, e).await),
		};
		locks.release().await;

		let report = SyncReport {
			transfers,
			first_run: mode == DeleteMode::Keep,
			hidden_from_incoming: exclusions.hide_from_incoming.len(),
			protected_from_delete: exclusions.hide_from_outgoing_delete.len(),
			committed_paths,
			slow,
		};
		info!("Sync finished ({} paths tracked)", report.committed_paths);
		Ok(report)
	}

	/// Snapshot the replica and diff it against the last committed state
	fn prepare(&self) -> Result<(Exclusions, DeleteMode), SyncError> {
		let control = &self.config.control;
		fs::create_dir_all(control.tmp_dir())?;

		let current = Snapshot::scan(&self.config.root, CONTROL_DIR)?;
		current.save(&control.current_tree())?;
		let previous = match Snapshot::load(&control.previous_tree())? {
			Some(previous) => previous,
			None => {
				info!("{} paths, no previous sync: merging without deletion", current.len());
				return Ok((Exclusions::default(), DeleteMode::Keep));
			}
		};

		let exclusions = Exclusions::build(&previous, &current);
		info!(
			"{} paths: {} deleted and {} created locally since last sync",
			current.len(),
			exclusions.hide_from_incoming.len(),
			exclusions.hide_from_outgoing_delete.len()
		);
		for path in &exclusions.hide_from_incoming {
			debug!("Not fetching locally deleted {}", path);
		}
		for path in &exclusions.hide_from_outgoing_delete {
			debug!("Protecting locally created {}", path);
		}
		Ok((exclusions, DeleteMode::Propagate))
	}

	/// Record the synced tree as the base of the next session
	///
	/// The tree is rescanned so files that arrived during the incoming phase
	/// count as known, not as local creations.
	fn commit(&self) -> Result<usize, SyncError> {
		let control = &self.config.control;
		let synced = Snapshot::scan(&self.config.root, CONTROL_DIR)?;
		synced.save(&control.current_tree())?;
		Snapshot::promote(&control.current_tree(), &control.previous_tree())?;
		Ok(synced.len())
	}
}

/// The signal, if `shutdown` has already resolved
async fn pending_signal<F>(shutdown: &mut F) -> Option<ShutdownSignal>
where
	F: Future<Output = ShutdownSignal> + Unpin,
{
	tokio::select! {
		biased;
		signal = shutdown => Some(signal),
		_ = std::future::ready(()) => None,
	}
}

// vim: ts=4
