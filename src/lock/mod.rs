//! Dual-site locking: at most one session per replica pair
//!
//! The local lock is always taken first, so a crashed local session is
//! reported before the remote side is touched. A failed remote acquisition
//! gives the local lock back before the error surfaces.

mod local;
mod probe;
mod remote;

pub use local::{read_owner, LocalLock};
pub use probe::{FixedProbe, ProcessProbe, SystemProbe};
pub use remote::{acquire_command, release_command, RemoteLock, REMOTE_LOCK_NAME};

use std::path::PathBuf;
use std::sync::Arc;

use crate::channel::RemoteChannel;
use crate::config::SessionConfig;
use crate::error::SyncError;
use crate::logging::*;

/// Acquires both locks of a session
pub struct LockCoordinator {
	lock_file: PathBuf,
	remote_control_dir: String,
	channel: Arc<dyn RemoteChannel>,
	probe: Arc<dyn ProcessProbe>,
}

impl LockCoordinator {
	pub fn new(
		session: &SessionConfig,
		channel: Arc<dyn RemoteChannel>,
		probe: Arc<dyn ProcessProbe>,
	) -> Self {
		LockCoordinator {
			lock_file: session.control.lock_file(),
			remote_control_dir: session.remote_control_dir(),
			channel,
			probe,
		}
	}

	pub fn acquire_local(&self) -> Result<LocalLock, SyncError> {
		LocalLock::acquire(&self.lock_file, self.probe.as_ref())
	}

	/// Take the remote lock while holding `local`
	pub async fn acquire_remote(&self, local: LocalLock) -> Result<SessionLocks, SyncError> {
		match RemoteLock::acquire(self.channel.clone(), &self.remote_control_dir).await {
			Ok(remote) => Ok(SessionLocks { local, remote }),
			Err(e) => {
				local.release();
				Err(e)
			}
		}
	}

	/// Local then remote
	pub async fn acquire(&self) -> Result<SessionLocks, SyncError> {
		let local = self.acquire_local()?;
		let locks = self.acquire_remote(local).await?;
		info!("Locks acquired ({})", self.channel.describe());
		Ok(locks)
	}
}

/// Both locks, held for the rest of the session
#[derive(Debug)]
pub struct SessionLocks {
	local: LocalLock,
	remote: RemoteLock,
}

impl SessionLocks {
	/// Best-effort release of both sites
	pub async fn release(self) {
		let SessionLocks { local, remote } = self;
		local.release();
		remote.release().await;
	}
}

// vim: ts=4
