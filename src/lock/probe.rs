//! Process liveness checks for stale-lock detection

/// Tells whether a process id belongs to a running process
pub trait ProcessProbe: Send + Sync {
	fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by `kill(pid, 0)`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
	fn is_alive(&self, pid: u32) -> bool {
		if pid == 0 || pid > i32::MAX as u32 {
			return false;
		}
		let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
		// EPERM: the process exists but belongs to someone else
		rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
	}
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl ProcessProbe for FixedProbe {
	fn is_alive(&self, _pid: u32) -> bool {
		self.0
	}
}


// vim: ts=4
