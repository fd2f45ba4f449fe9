//! rsync-backed transfers

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::{ItemizedChange, Phase, Transfer, TransferRequest, TransferStatus};
use crate::config::SessionConfig;
use crate::logging::*;

/// Runs the configured rsync binary
#[derive(Debug, Clone)]
pub struct RsyncTransfer {
	program: String,
	base_args: Vec<String>,
	scratch_dir: PathBuf,
}

impl RsyncTransfer {
	pub fn new(session: &SessionConfig) -> Self {
		let config = &session.config;
		// archive, update (keep newer receiver files), one file system, itemize
		let mut base_args = vec!["-auxi".to_string()];
		if config.is_remote() {
			base_args.push("-z".to_string());
			base_args.push("-e".to_string());
			base_args.push(config.ssh_command.clone());
		}
		base_args.extend(config.transfer_options.iter().cloned());
		RsyncTransfer {
			program: config.transfer_command.clone(),
			base_args,
			scratch_dir: session.control.tmp_dir(),
		}
	}

	/// Scratch file holding the filter rules of a phase
	pub fn rules_file(&self, phase: Phase) -> PathBuf {
		self.scratch_dir.join(format!("{}-filter", phase.as_str()))
	}

	/// Full argument list for a request
	pub fn args(&self, request: &TransferRequest, rules_file: &Path) -> Vec<String> {
		let mut args = self.base_args.clone();
		if request.delete {
			args.push("--delete".to_string());
		}
		args.push(format!("--filter=merge {}", rules_file.display()));
		if let Some(exclude_from) = &request.exclude_from {
			args.push(format!("--exclude-from={}", exclude_from.display()));
		}
		args.push(request.source.clone());
		args.push(request.destination.clone());
		args
	}

	async fn write_rules(&self, request: &TransferRequest) -> io::Result<PathBuf> {
		tokio::fs::create_dir_all(&self.scratch_dir).await?;
		let path = self.rules_file(request.phase);
		let mut text = String::new();
		for rule in &request.rules {
			text.push_str(&rule.to_string());
			text.push('\n');
		}
		tokio::fs::write(&path, text).await?;
		Ok(path)
	}
}

#[async_trait]
impl Transfer for RsyncTransfer {
	async fn transfer(&self, request: &TransferRequest) -> io::Result<TransferStatus> {
		let rules_file = self.write_rules(request).await?;
		let args = self.args(request, &rules_file);
		debug!("{} {}", self.program, args.join(" "));

		let mut child = tokio::process::Command::new(&self.program)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()?;

		let stdout = child.stdout.take();
		let stderr = child.stderr.take();
		let phase = request.phase;
		let (changes, _) = tokio::join!(read_items(stdout, phase), log_stderr(stderr, phase));
		let status = child.wait().await?;

		Ok(TransferStatus { code: status.code(), changes })
	}
}

async fn read_items<R: AsyncRead + Unpin>(stream: Option<R>, phase: Phase) -> Vec<ItemizedChange> {
	let mut changes = Vec::new();
	let stream = match stream {
		Some(stream) => stream,
		None => return changes,
	};
	let arrow = match phase {
		Phase::Incoming => "<-",
		Phase::Outgoing => "->",
	};
	let mut lines = BufReader::new(stream).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		match ItemizedChange::parse(&line) {
			Some(change) => {
				info!("{} {}", arrow, change);
				changes.push(change);
			}
			None if !line.trim().is_empty() => debug!("rsync: {}", line),
			None => {}
		}
	}
	changes
}

async fn log_stderr<R: AsyncRead + Unpin>(stream: Option<R>, phase: Phase) {
	if let Some(stream) = stream {
		let mut lines = BufReader::new(stream).lines();
		while let Ok(Some(line)) = lines.next_line().await {
			warn!("rsync ({}): {}", phase.as_str(), line);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{Config, SessionConfig};
	use crate::exclusion::FilterRule;

	fn request(phase: Phase) -> TransferRequest {
		TransferRequest {
			phase,
			source: "box:/srv/pocket/".into(),
			destination: "/home/u/pocket/".into(),
			delete: true,
			rules: vec![FilterRule::exclude(".pairsync"), FilterRule::exclude("gone")],
			exclude_from: Some(PathBuf::from("/home/u/pocket/.pairsync/exclude")),
		}
	}

	#[test]
	fn test_remote_args() {
		let mut config = Config::new("box", "/srv/pocket");
		config.transfer_options = vec!["--backup".into()];
		let session = SessionConfig::new("/home/u/pocket", config);
		let rsync = RsyncTransfer::new(&session);
		let rules = rsync.rules_file(Phase::Incoming);
		assert_eq!(rules, PathBuf::from("/home/u/pocket/.pairsync/tmp/incoming-filter"));
		assert_eq!(
			rsync.args(&request(Phase::Incoming), &rules),
			vec![
				"-auxi",
				"-z",
				"-e",
				"ssh",
				"--backup",
				"--delete",
				"--filter=merge /home/u/pocket/.pairsync/tmp/incoming-filter",
				"--exclude-from=/home/u/pocket/.pairsync/exclude",
				"box:/srv/pocket/",
				"/home/u/pocket/",
			]
		);
	}

	#[test]
	fn test_local_mode_skips_remote_shell() {
		let session = SessionConfig::new("/a", Config::new("", "/b"));
		let rsync = RsyncTransfer::new(&session);
		let mut req = request(Phase::Outgoing);
		req.exclude_from = None;
		req.delete = false;
		let args = rsync.args(&req, Path::new("/a/.pairsync/tmp/outgoing-filter"));
		assert_eq!(args[0], "-auxi");
		assert!(!args.iter().any(|a| a == "-e" || a == "--delete" || a == "-z"));
	}

	#[tokio::test]
	async fn test_rules_file_contents() {
		let tmp = tempfile::TempDir::new().unwrap();
		let session = SessionConfig::new(tmp.path(), Config::new("", "/b"));
		let rsync = RsyncTransfer::new(&session);
		let mut req = request(Phase::Incoming);
		req.rules.push(FilterRule::protect("new dir/file"));
		let path = rsync.write_rules(&req).await.unwrap();
		assert_eq!(
			std::fs::read_to_string(path).unwrap(),
			"- /.pairsync\n- /gone\nP /new dir/file\n"
		);
	}

	#[tokio::test]
	async fn test_missing_binary_is_spawn_error() {
		let tmp = tempfile::TempDir::new().unwrap();
		let mut config = Config::new("", "/b");
		config.transfer_command = "/nonexistent/rsync-binary".into();
		let rsync = RsyncTransfer::new(&SessionConfig::new(tmp.path(), config));
		assert!(rsync.transfer(&request(Phase::Incoming)).await.is_err());
	}
}

// vim: ts=4
