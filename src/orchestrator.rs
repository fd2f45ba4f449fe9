//! Two-phase transfer: pull remote changes, then push local ones
//!
//! Remote deletions are reconciled before local changes are sent. Each phase
//! deletes on its destination; the exclusion sets keep that from undoing the
//! user's own local deletions and creations:
//!
//! - paths deleted locally are excluded from the pull, so they are not
//!   fetched back, and the push then deletes them remotely;
//! - paths created locally are protected in both phases, so the pull does not
//!   delete them as "missing on the remote" and the push never removes them.
//!
//! The first session has no previous tree to diff against. It runs both
//! phases without deletion, which merges the two replicas.

use crate::config::{SessionConfig, CONTROL_DIR};
use crate::error::SyncError;
use crate::exclusion::{Exclusions, FilterRule};
use crate::logging::*;
use crate::transfer::{ChangeKind, ItemizedChange, Phase, Transfer, TransferRequest};

/// Whether receivers delete files the sender does not have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
	/// First session: nothing is deleted on either side
	Keep,
	/// Deletions propagate, subject to the exclusions
	Propagate,
}

/// Changes reported by one phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
	pub transferred: usize,
	pub deleted: usize,
	pub other: usize,
}

impl PhaseReport {
	fn from_changes(changes: &[ItemizedChange]) -> Self {
		let mut report = PhaseReport::default();
		for change in changes {
			match change.kind {
				ChangeKind::Transferred => report.transferred += 1,
				ChangeKind::Deleted => report.deleted += 1,
				_ => report.other += 1,
			}
		}
		report
	}
}

/// Changes reported by both phases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
	pub incoming: PhaseReport,
	pub outgoing: PhaseReport,
}

/// Sequences the two transfer invocations of a session
pub struct TransferOrchestrator<'a> {
	session: &'a SessionConfig,
	transfer: &'a dyn Transfer,
}

impl<'a> TransferOrchestrator<'a> {
	pub fn new(session: &'a SessionConfig, transfer: &'a dyn Transfer) -> Self {
		TransferOrchestrator { session, transfer }
	}

	/// Request for one phase
	pub fn request(&self, phase: Phase, exclusions: &Exclusions, mode: DeleteMode) -> TransferRequest {
		let local = self.session.local_endpoint();
		let remote = self.session.config.remote_endpoint();
		let (source, destination) = match phase {
			Phase::Incoming => (remote, local),
			Phase::Outgoing => (local, remote),
		};

		let mut rules = vec![FilterRule::exclude(CONTROL_DIR)];
		if phase == Phase::Incoming {
			rules.extend(exclusions.hide_from_incoming.iter().map(|p| FilterRule::exclude(p)));
		}
		rules.extend(exclusions.hide_from_outgoing_delete.iter().map(|p| FilterRule::protect(p)));

		TransferRequest {
			phase,
			source,
			destination,
			delete: mode == DeleteMode::Propagate,
			rules,
			exclude_from: self.session.user_exclude_file(),
		}
	}

	/// Incoming, then outgoing; the first failure ends the run
	pub async fn run(
		&self,
		exclusions: &Exclusions,
		mode: DeleteMode,
	) -> Result<TransferReport, SyncError> {
		let incoming = self.run_phase(Phase::Incoming, exclusions, mode).await?;
		let outgoing = self.run_phase(Phase::Outgoing, exclusions, mode).await?;
		Ok(TransferReport { incoming, outgoing })
	}

	async fn run_phase(
		&self,
		phase: Phase,
		exclusions: &Exclusions,
		mode: DeleteMode,
	) -> Result<PhaseReport, SyncError> {
		let request = self.request(phase, exclusions, mode);
		info!("{} transfer: {} -> {}", phase, request.source, request.destination);

		let status = self.transfer.transfer(&request).await.map_err(|e| {
			SyncError::TransferFailure { phase, message: format!("cannot run transfer tool: {}", e) }
		})?;
		if !status.success() {
			let message = match status.code {
				Some(code) => format!("transfer tool exited with status {}", code),
				None => "transfer tool was terminated by a signal".to_string(),
			};
			return Err(SyncError::TransferFailure { phase, message });
		}

		let report = PhaseReport::from_changes(&status.changes);
		info!(
			"{} transfer done: {} transferred, {} deleted, {} other",
			phase, report.transferred, report.deleted, report.other
		);
		Ok(report)
	}
}


// vim: ts=4
