//! Lock marker next to the remote replica
//!
//! The marker is a directory: `mkdir` either creates it or fails because it
//! exists, in one atomic step on any POSIX filesystem.

use std::sync::Arc;

use crate::channel::RemoteChannel;
use crate::error::SyncError;
use crate::logging::*;
use crate::utils::quote_path;

/// Name of the marker inside the remote control directory
pub const REMOTE_LOCK_NAME: &str = "lock";

/// Shell command creating the remote control directory and the marker
pub fn acquire_command(remote_control_dir: &str) -> String {
	let dir = quote_path(remote_control_dir);
	let marker = quote_path(&format!("{}/{}", remote_control_dir, REMOTE_LOCK_NAME));
	format!("mkdir -p {} && mkdir {}", dir, marker)
}

/// Shell command removing the marker
pub fn release_command(remote_control_dir: &str) -> String {
	format!("rmdir {}", quote_path(&format!("{}/{}", remote_control_dir, REMOTE_LOCK_NAME)))
}

/// Held remote lock marker
pub struct RemoteLock {
	channel: Arc<dyn RemoteChannel>,
	control_dir: String,
}

impl std::fmt::Debug for RemoteLock {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteLock")
			.field("channel", &self.channel.describe())
			.field("control_dir", &self.control_dir)
			.finish()
	}
}

impl RemoteLock {
	pub async fn acquire(
		channel: Arc<dyn RemoteChannel>,
		control_dir: &str,
	) -> Result<Self, SyncError> {
		let output = channel
			.execute(&acquire_command(control_dir))
			.await
			.map_err(|e| SyncError::RemoteLockBusy { message: e.to_string() })?;
		if !output.success() {
			return Err(SyncError::RemoteLockBusy {
				message: format!(
					"{}/{} on {} ({})",
					control_dir,
					REMOTE_LOCK_NAME,
					channel.describe(),
					output.failure_reason()
				),
			});
		}
		debug!("Remote lock acquired via {}", channel.describe());
		Ok(RemoteLock { channel, control_dir: control_dir.to_string() })
	}

	/// Remove the marker; failures are logged, never returned
	pub async fn release(self) {
		match self.channel.execute(&release_command(&self.control_dir)).await {
			Ok(output) if output.success() => debug!("Remote lock released"),
			Ok(output) => warn!(
				"Failed to remove remote lock {}/{}: {}",
				self.control_dir,
				REMOTE_LOCK_NAME,
				output.failure_reason()
			),
			Err(e) => warn!("Failed to remove remote lock: {}", e),
		}
	}
}


// vim: ts=4
