//! Child processes that take their descendants down with them

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

/// A `sh -c` child running as leader of its own process group
///
/// The group is killed once the shell has exited, and when the value is
/// dropped before that, so shell commands cannot leave background
/// descendants running.
#[derive(Debug)]
pub struct GroupChild {
	child: Child,
	pgid: Option<i32>,
}

impl GroupChild {
	/// Spawn `command` through `sh -c` in a new process group
	pub fn spawn_shell(command: &str) -> io::Result<Self> {
		let child = Command::new("sh")
			.arg("-c")
			.arg(command)
			.stdin(Stdio::null())
			.process_group(0)
			.kill_on_drop(true)
			.spawn()?;
		// The child is the group leader, so its pid is the group id
		let pgid = child.id().map(|pid| pid as i32);
		Ok(GroupChild { child, pgid })
	}

	/// Wait for the shell, then kill whatever it left in its group
	pub async fn wait(&mut self) -> io::Result<ExitStatus> {
		let status = self.child.wait().await;
		self.kill_group();
		status
	}

	/// Send SIGKILL to the whole process group, once
	pub fn kill_group(&mut self) {
		if let Some(pgid) = self.pgid.take() {
			unsafe {
				libc::kill(-pgid, libc::SIGKILL);
			}
		}
	}
}

impl Drop for GroupChild {
	fn drop(&mut self) {
		self.kill_group();
	}
}


// vim: ts=4
