//! Pid-file lock in the local control directory

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::probe::ProcessProbe;
use crate::error::SyncError;
use crate::logging::*;

static NEXT_TMP: AtomicUsize = AtomicUsize::new(0);

/// RAII guard for the local lock file
#[derive(Debug)]
pub struct LocalLock {
	path: PathBuf,
	released: bool,
}

impl LocalLock {
	/// Create the lock file holding our pid
	///
	/// The pid is written to a private file first and hard-linked into
	/// place, so the lock file never exists without its owner in it.
	///
	/// An existing file is never replaced: a live owner means another session
	/// is running, a dead or unreadable one means a crashed session that an
	/// operator has to look at.
	pub fn acquire(path: &Path, probe: &dyn ProcessProbe) -> Result<Self, SyncError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}

		let pid = std::process::id();
		let tmp = write_owner_file(path, pid)?;
		let linked = fs::hard_link(&tmp, path);
		if let Err(e) = fs::remove_file(&tmp) {
			warn!("Failed to remove {}: {}", tmp.display(), e);
		}

		match linked {
			Ok(()) => {
				debug!("Local lock {} acquired by pid {}", path.display(), pid);
				Ok(LocalLock { path: path.to_path_buf(), released: false })
			}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
				let pid = read_owner(path);
				match pid {
					Some(pid) if probe.is_alive(pid) => {
						Err(SyncError::AlreadyRunning { pid, lock_file: path.to_path_buf() })
					}
					_ => Err(SyncError::StaleLock { pid, lock_file: path.to_path_buf() }),
				}
			}
			Err(e) => Err(SyncError::Io(e)),
		}
	}

	/// Remove the lock file; failures are logged, never returned
	pub fn release(mut self) {
		self.remove();
	}

	fn remove(&mut self) {
		if self.released {
			return;
		}
		self.released = true;
		match fs::remove_file(&self.path) {
			Ok(()) => debug!("Local lock {} released", self.path.display()),
			Err(e) => warn!("Failed to remove local lock {}: {}", self.path.display(), e),
		}
	}
}

impl Drop for LocalLock {
	fn drop(&mut self) {
		self.remove();
	}
}

/// Write `pid` to a file next to `lock_path` that no one else uses
fn write_owner_file(lock_path: &Path, pid: u32) -> io::Result<PathBuf> {
	let mut name = OsString::from(lock_path.as_os_str());
	name.push(format!(".{}.{}", pid, NEXT_TMP.fetch_add(1, Ordering::Relaxed)));
	let tmp = PathBuf::from(name);

	let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp)?;
	let written = writeln!(file, "{}", pid).and_then(|_| file.sync_all());
	if let Err(e) = written {
		let _ = fs::remove_file(&tmp);
		return Err(e);
	}
	Ok(tmp)
}

/// Pid recorded in a lock file, if it can be read
pub fn read_owner(path: &Path) -> Option<u32> {
	fs::read_to_string(path).ok()?.trim().parse().ok()
}


// vim: ts=4
