//! Error types for PairSync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::transfer::Phase;
use crate::utils::ShutdownSignal;

/// Exit code for a session refused because another one is running
pub const EXIT_ALREADY_RUNNING: u8 = 1;
/// Exit code for a local lock left behind by a dead session
pub const EXIT_STALE_LOCK: u8 = 2;
/// Exit code for a remote lock that could not be taken
pub const EXIT_REMOTE_LOCK: u8 = 3;
/// Exit code for transfer, setup and usage failures
pub const EXIT_FAILURE: u8 = 128;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Another live session holds the local lock
	AlreadyRunning { pid: u32, lock_file: PathBuf },

	/// Local lock file orphaned by a session that is no longer alive
	StaleLock { pid: Option<u32>, lock_file: PathBuf },

	/// Remote lock marker is held, or the remote call failed
	RemoteLockBusy { message: String },

	/// One of the two transfer phases failed
	TransferFailure { phase: Phase, message: String },

	/// The replica has no control directory yet
	NotInitialized { path: PathBuf },

	/// `init` was run on an already initialized replica
	AlreadyInitialized { path: PathBuf },

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Snapshot persistence error (nested)
	State(StateError),

	/// Session interrupted by a signal
	Interrupted { signal: i32 },

	/// I/O error
	Io(io::Error),
}

impl SyncError {
	/// Process exit code reported for this error
	pub fn exit_code(&self) -> u8 {
		match self {
			SyncError::AlreadyRunning { .. } => EXIT_ALREADY_RUNNING,
			SyncError::StaleLock { .. } => EXIT_STALE_LOCK,
			SyncError::RemoteLockBusy { .. } => EXIT_REMOTE_LOCK,
			SyncError::Interrupted { signal } => {
				EXIT_FAILURE.saturating_add((*signal).clamp(0, 127) as u8)
			}
			_ => EXIT_FAILURE,
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::AlreadyRunning { pid, lock_file } => {
				write!(
					f,
					"Another sync is already running (pid {}, lock file {})",
					pid,
					lock_file.display()
				)
			}
			SyncError::StaleLock { pid, lock_file } => {
				let owner = match pid {
					Some(pid) => format!("pid {} is not running", pid),
					None => "owner pid is unreadable".to_string(),
				};
				write!(
					f,
					"Stale lock file found ({}). A previous sync may have crashed; check the replica and remove {} manually",
					owner,
					lock_file.display()
				)
			}
			SyncError::RemoteLockBusy { message } => {
				write!(f, "Could not acquire remote lock: {}", message)
			}
			SyncError::TransferFailure { phase, message } => {
				write!(f, "{} transfer failed: {}", phase, message)
			}
			SyncError::NotInitialized { path } => {
				write!(f, "Not initialized: {} does not exist (run `pairsync init`)", path.display())
			}
			SyncError::AlreadyInitialized { path } => {
				write!(f, "Already initialized: {} exists", path.display())
			}
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Interrupted { signal } => write!(f, "Interrupted by signal {}", signal),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<ShutdownSignal> for SyncError {
	fn from(signal: ShutdownSignal) -> Self {
		SyncError::Interrupted { signal: signal.number() }
	}
}

/// Remote-execution channel errors
#[derive(Debug)]
pub enum ChannelError {
	/// SSH could not be started for the host
	SshFailed { host: String, source: io::Error },

	/// Local subprocess spawn failed
	SpawnFailed { cmd: String, source: io::Error },

	/// The configured remote shell command is empty
	EmptyCommand,
}

impl fmt::Display for ChannelError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChannelError::SshFailed { host, source } => {
				write!(f, "SSH connection to {} failed: {}", host, source)
			}
			ChannelError::SpawnFailed { cmd, source } => {
				write!(f, "Failed to spawn '{}': {}", cmd, source)
			}
			ChannelError::EmptyCommand => write!(f, "Remote shell command is empty"),
		}
	}
}

impl Error for ChannelError {}

/// Snapshot persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to load a snapshot file
	LoadFailed { path: PathBuf, source: io::Error },

	/// Failed to save or promote a snapshot file
	SaveFailed { path: PathBuf, source: io::Error },

	/// Failed to walk the replica tree
	ScanFailed { path: PathBuf, source: io::Error },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { path, source } => {
				write!(f, "Failed to load {}: {}", path.display(), source)
			}
			StateError::SaveFailed { path, source } => {
				write!(f, "Failed to save {}: {}", path.display(), source)
			}
			StateError::ScanFailed { path, source } => {
				write!(f, "Cannot read {}: {}", path.display(), source)
			}
		}
	}
}

impl Error for StateError {}


// vim: ts=4
