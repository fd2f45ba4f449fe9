//! Teardown of a failed session
//!
//! Locks go first so a waiting scheduler can start the next session as soon
//! as possible; then the notifier and its children are killed. Nothing here
//! retries: the caller decides whether to run again later.

use crate::error::SyncError;
use crate::lock::SessionLocks;
use crate::logging::*;
use crate::notifier::NotifierHandle;

/// Release both locks, kill the notifier and hand back the fatal error
pub async fn abort_session(
	locks: SessionLocks,
	notifier: Option<NotifierHandle>,
	error: SyncError,
) -> SyncError {
	error!("Sync failed: {}", error);
	locks.release().await;
	if let Some(notifier) = notifier {
		notifier.kill().await;
	}
	error
}

// vim: ts=4
