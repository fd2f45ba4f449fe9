//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Incoming transfer finished");
//! warn!("Failed to remove remote lock");
//! ```

pub use tracing::{debug, error, info, warn};

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber with environment filter support.
///
/// By default, logs at INFO level and above are displayed on stderr. Control the
/// log level with the `RUST_LOG` environment variable:
///
/// ```bash
/// RUST_LOG=debug pairsync
/// RUST_LOG=pairsync::lock=trace pairsync
/// ```
pub fn init_tracing() {
	tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(io::stderr).init();
}

/// Initialize tracing for unattended runs, appending to `log_file`.
///
/// Colours are disabled so the log stays readable with `pairsync log`.
pub fn init_file_tracing(log_file: &Path) -> io::Result<()> {
	let file = OpenOptions::new().create(true).append(true).open(log_file)?;
	tracing_subscriber::fmt()
		.with_env_filter(env_filter())
		.with_ansi(false)
		.with_writer(Mutex::new(file))
		.init();
	Ok(())
}

// vim: ts=4
