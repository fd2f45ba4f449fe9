//! External transfer tool interface
//!
//! The orchestrator describes each transfer as a [`TransferRequest`]; an
//! implementation of [`Transfer`] carries it out. [`RsyncTransfer`] is the
//! real one.

mod itemize;
mod rsync;

pub use itemize::{ChangeKind, ItemizedChange};
pub use rsync::RsyncTransfer;

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::exclusion::{FilterRule, RuleAction};

/// Direction of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	/// Remote to local
	Incoming,
	/// Local to remote
	Outgoing,
}

impl Phase {
	pub fn as_str(self) -> &'static str {
		match self {
			Phase::Incoming => "incoming",
			Phase::Outgoing => "outgoing",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Phase::Incoming => write!(f, "Incoming"),
			Phase::Outgoing => write!(f, "Outgoing"),
		}
	}
}

/// One invocation of the transfer tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
	pub phase: Phase,

	/// Source endpoint, with trailing slash
	pub source: String,

	/// Destination endpoint, with trailing slash
	pub destination: String,

	/// Delete destination files missing from the source
	pub delete: bool,

	/// Filter rules, first match wins
	pub rules: Vec<FilterRule>,

	/// User exclude-pattern file
	pub exclude_from: Option<PathBuf>,
}

impl TransferRequest {
	/// Whether `path` is excluded from this transfer by a rule
	pub fn excludes(&self, path: &str) -> bool {
		self.rules.iter().any(|r| r.action == RuleAction::Exclude && r.targets(path))
	}

	/// Whether `path` is protected from deletion by a rule
	pub fn protects(&self, path: &str) -> bool {
		self.rules.iter().any(|r| r.action == RuleAction::Protect && r.targets(path))
	}
}

/// Outcome of a transfer tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStatus {
	/// Exit code, None when killed by a signal
	pub code: Option<i32>,

	/// Changes the tool reported
	pub changes: Vec<ItemizedChange>,
}

impl TransferStatus {
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

/// Runs transfers; a spawn failure is an `Err`, a failed run a non-zero code
#[async_trait]
pub trait Transfer: Send + Sync {
	async fn transfer(&self, request: &TransferRequest) -> io::Result<TransferStatus>;
}

// vim: ts=4
