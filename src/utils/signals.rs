//! Signal handling for interruptible sessions

use std::io;
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::logging::*;

/// Termination signal received by the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
	Interrupt,
	Terminate,
}

impl ShutdownSignal {
	pub fn number(self) -> i32 {
		match self {
			ShutdownSignal::Interrupt => libc::SIGINT,
			ShutdownSignal::Terminate => libc::SIGTERM,
		}
	}
}

/// Installed SIGINT/SIGTERM handlers
///
/// Signals are caught from `install` on, whether or not `recv` is being
/// polled, so a session can take its locks without a signal killing the
/// process halfway through.
pub struct ShutdownListener {
	sigint: Signal,
	sigterm: Signal,
}

impl ShutdownListener {
	/// Replace the default action of SIGINT and SIGTERM
	pub fn install() -> io::Result<Self> {
		let sigterm = signal(SignalKind::terminate())?;
		let sigint = signal(SignalKind::interrupt())?;
		Ok(ShutdownListener { sigint, sigterm })
	}

	/// Resolve on the first signal received since `install`
	pub async fn recv(&mut self) -> ShutdownSignal {
		tokio::select! {
			_ = self.sigterm.recv() => {
				debug!("Received SIGTERM, cleaning up...");
				ShutdownSignal::Terminate
			}
			_ = self.sigint.recv() => {
				debug!("Received SIGINT, cleaning up...");
				ShutdownSignal::Interrupt
			}
		}
	}
}


// vim: ts=4
