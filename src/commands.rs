//! Command implementations behind the CLI

use std::fs;
use std::future::Future;
use std::io::{SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::{Config, ControlDir, SessionConfig};
use crate::error::SyncError;
use crate::logging::*;
use crate::session::{Collaborators, Session, SyncReport};
use crate::utils::ShutdownListener;

/// Lines shown by `log` before following
pub const LOG_TAIL_LINES: usize = 10;

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(500);

const CONFIG_HEADER: &str = "\
# pairsync configuration
#
# remote-host          ssh host of the remote replica; omit for a local path
# remote-path          remote replica root
# transfer-options     extra rsync options, e.g. [\"--backup\", \"--backup-dir=.trash\"]
# slow-sync-time       seconds before slow-sync-start-cmd runs
# slow-sync-start-cmd  e.g. \"notify-send 'Sync is taking a while'\"
# slow-sync-stop-cmd   e.g. \"notify-send 'Sync finished'\"

";

const EXCLUDE_TEMPLATE: &str = "\
# rsync exclude patterns, one per line, e.g.
# *.swp
# /build/
";

/// Create the control directory of a new replica
pub fn init(root: &Path, remote_host: &str, remote_path: &str) -> Result<(), SyncError> {
	let control = ControlDir::new(root);
	if control.path().exists() {
		return Err(SyncError::AlreadyInitialized { path: control.path().to_path_buf() });
	}

	let config = Config::new(remote_host, remote_path);
	config.validate()?;

	fs::create_dir_all(control.tmp_dir())?;
	let mut text = CONFIG_HEADER.to_string();
	text.push_str(&config.to_toml()?);
	fs::write(control.config_file(), text)?;
	fs::write(control.path().join(&config.exclude_file), EXCLUDE_TEMPLATE)?;

	let target = match config.host() {
		Some(host) => format!("{}:{}", host, config.remote_path),
		None => config.remote_path.clone(),
	};
	info!("Initialized {} for {}", control.path().display(), target);
	Ok(())
}

/// Run one session against the replica at `root`
///
/// SIGINT and SIGTERM are caught before any lock is taken; from then on a
/// signal ends the session through the regular cleanup.
pub async fn sync(root: &Path) -> Result<SyncReport, SyncError> {
	let mut shutdown = ShutdownListener::install()?;
	let session_config = Arc::new(SessionConfig::load(root)?);
	let parts = Collaborators::system(&session_config);
	let session = Session::new(session_config, parts);
	session.run_until(shutdown.recv()).await
}

/// Run one session for a scheduler; diagnostics go to the log file
///
/// The caller installs file logging before calling this.
pub async fn cron(root: &Path) -> Result<SyncReport, SyncError> {
	info!("Scheduled sync of {} started", root.display());
	let result = sync(root).await;
	match &result {
		Ok(_) => info!("Scheduled sync finished"),
		Err(e) => error!("Scheduled sync failed: {} (exit code {})", e, e.exit_code()),
	}
	result
}

/// Print the tail of the log and follow it until interrupted
pub async fn log(root: &Path) -> Result<(), SyncError> {
	let control = ControlDir::new(root);
	if !control.is_initialized() {
		return Err(SyncError::NotInitialized { path: control.path().to_path_buf() });
	}
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	follow_log(&control.log_file(), LOG_TAIL_LINES, &mut out, async {
		let _ = tokio::signal::ctrl_c().await;
	})
	.await
}

/// Write the last `lines` lines of `path`, then whatever gets appended,
/// until `stop` resolves
///
/// A missing file counts as empty; a truncated one is followed from the start.
pub async fn follow_log<W, F>(path: &Path, lines: usize, out: &mut W, stop: F) -> Result<(), SyncError>
where
	W: Write,
	F: Future<Output = ()>,
{
	let content = match tokio::fs::read(path).await {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
		Err(e) => return Err(SyncError::Io(e)),
	};
	out.write_all(tail(&content, lines))?;
	out.flush()?;
	let mut offset = content.len() as u64;

	tokio::pin!(stop);
	loop {
		tokio::select! {
			_ = &mut stop => return Ok(()),
			_ = tokio::time::sleep(LOG_POLL_INTERVAL) => {}
		}

		let len = match tokio::fs::metadata(path).await {
			Ok(meta) => meta.len(),
			Err(_) => continue,
		};
		if len < offset {
			offset = 0;
		}
		if len == offset {
			continue;
		}

		let mut file = tokio::fs::File::open(path).await?;
		file.seek(SeekFrom::Start(offset)).await?;
		let mut appended = Vec::new();
		file.read_to_end(&mut appended).await?;
		offset += appended.len() as u64;
		out.write_all(&appended)?;
		out.flush()?;
	}
}

/// Last `lines` lines of `content`
fn tail(content: &[u8], lines: usize) -> &[u8] {
	if lines == 0 {
		return &[];
	}
	let body = content.strip_suffix(b"\n").unwrap_or(content);
	let mut seen = 0;
	for (i, b) in body.iter().enumerate().rev() {
		if *b == b'\n' {
			seen += 1;
			if seen == lines {
				return &content[i + 1..];
			}
		}
	}
	content
}


// vim: ts=4
