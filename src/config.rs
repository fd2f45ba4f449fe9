//! Replica configuration and the immutable per-session view of it
//!
//! The configuration lives in `.pairsync/config.toml` inside the local
//! replica. It is read once at startup and wrapped, together with the control
//! directory layout, into a [`SessionConfig`] that every component borrows.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;

/// Name of the control directory in both replicas
pub const CONTROL_DIR: &str = ".pairsync";

// ============================================================================
// CONFIGURATION FILE
// ============================================================================

/// Contents of `.pairsync/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
	/// SSH host of the remote replica (None = local subprocess mode)
	pub remote_host: Option<String>,

	/// Path of the remote replica root
	pub remote_path: String,

	/// Remote shell command, also passed to rsync with `-e`
	pub ssh_command: String,

	/// Transfer tool binary
	pub transfer_command: String,

	/// Extra options appended to every transfer invocation
	pub transfer_options: Vec<String>,

	/// User exclude-pattern file, relative to the control directory
	pub exclude_file: PathBuf,

	/// Seconds before the slow-sync notification fires
	pub slow_sync_time: u64,

	/// Shell command run once the sync is considered slow
	pub slow_sync_start_cmd: Option<String>,

	/// Shell command run when a slow sync has finished
	pub slow_sync_stop_cmd: Option<String>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			remote_host: None,
			remote_path: String::new(),
			ssh_command: "ssh".to_string(),
			transfer_command: "rsync".to_string(),
			transfer_options: vec![],
			exclude_file: PathBuf::from("exclude"),
			slow_sync_time: 10,
			slow_sync_start_cmd: None,
			slow_sync_stop_cmd: None,
		}
	}
}

impl Config {
	/// Configuration for a fresh replica; an empty host selects local mode
	pub fn new(remote_host: &str, remote_path: &str) -> Self {
		let host = remote_host.trim();
		Config {
			remote_host: if host.is_empty() { None } else { Some(host.to_string()) },
			remote_path: remote_path.to_string(),
			..Config::default()
		}
	}

	/// Parse a TOML configuration
	pub fn from_toml(text: &str) -> Result<Self, SyncError> {
		let config: Config = toml::from_str(text)
			.map_err(|e| SyncError::InvalidConfig { message: e.to_string() })?;
		config.validate()?;
		Ok(config)
	}

	/// Render as TOML, as written by `init`
	pub fn to_toml(&self) -> Result<String, SyncError> {
		toml::to_string_pretty(self).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })
	}

	/// Reject configurations no session could run with
	pub fn validate(&self) -> Result<(), SyncError> {
		if self.remote_path.trim().is_empty() {
			return Err(SyncError::InvalidConfig { message: "remote-path is empty".to_string() });
		}
		if self.slow_sync_time == 0 {
			return Err(SyncError::InvalidConfig {
				message: "slow-sync-time must be at least 1 second".to_string(),
			});
		}
		if self.transfer_command.trim().is_empty() {
			return Err(SyncError::InvalidConfig { message: "transfer-command is empty".to_string() });
		}
		Ok(())
	}

	/// Host to reach over ssh, treating an empty string as local mode
	pub fn host(&self) -> Option<&str> {
		self.remote_host.as_deref().map(str::trim).filter(|h| !h.is_empty())
	}

	pub fn is_remote(&self) -> bool {
		self.host().is_some()
	}

	/// Transfer endpoint of the remote replica, with a trailing slash
	///
	/// In local mode `~/` is expanded here since no shell sees the path.
	pub fn remote_endpoint(&self) -> String {
		let path = self.remote_path.trim_end_matches('/');
		match self.host() {
			Some(host) => format!("{}:{}/", host, path),
			None => format!("{}/", expand_home(path)),
		}
	}

	pub fn slow_sync_threshold(&self) -> Duration {
		Duration::from_secs(self.slow_sync_time)
	}
}

fn expand_home(path: &str) -> String {
	if let Some(rest) = path.strip_prefix("~/") {
		if let Ok(home) = std::env::var("HOME") {
			return format!("{}/{}", home.trim_end_matches('/'), rest);
		}
	}
	path.to_string()
}

// ============================================================================
// CONTROL DIRECTORY LAYOUT
// ============================================================================

/// Paths inside the local control directory
#[derive(Debug, Clone)]
pub struct ControlDir {
	dir: PathBuf,
}

impl ControlDir {
	pub fn new(root: &Path) -> Self {
		ControlDir { dir: root.join(CONTROL_DIR) }
	}

	pub fn path(&self) -> &Path {
		&self.dir
	}

	pub fn config_file(&self) -> PathBuf {
		self.dir.join("config.toml")
	}

	/// Snapshot committed by the last successful session
	pub fn previous_tree(&self) -> PathBuf {
		self.dir.join("tree-previous")
	}

	/// Snapshot taken by the running session
	pub fn current_tree(&self) -> PathBuf {
		self.dir.join("tree-current")
	}

	pub fn tmp_dir(&self) -> PathBuf {
		self.dir.join("tmp")
	}

	pub fn lock_file(&self) -> PathBuf {
		self.tmp_dir().join("lock")
	}

	pub fn log_file(&self) -> PathBuf {
		self.dir.join("log")
	}

	pub fn is_initialized(&self) -> bool {
		self.config_file().is_file()
	}
}

// ============================================================================
// SESSION CONFIGURATION
// ============================================================================

/// Immutable configuration of one invocation
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Local replica root
	pub root: PathBuf,

	/// Control directory layout under `root`
	pub control: ControlDir,

	/// Loaded configuration
	pub config: Config,
}

impl SessionConfig {
	pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
		let root = root.into();
		let control = ControlDir::new(&root);
		SessionConfig { root, control, config }
	}

	/// Load `.pairsync/config.toml` from an initialized replica
	pub fn load(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
		let root = root.into();
		let control = ControlDir::new(&root);
		let config_file = control.config_file();
		let text = match fs::read_to_string(&config_file) {
			Ok(text) => text,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				return Err(SyncError::NotInitialized { path: control.path().to_path_buf() });
			}
			Err(e) => return Err(SyncError::Io(e)),
		};
		let config = Config::from_toml(&text)?;
		Ok(SessionConfig { root, control, config })
	}

	/// User exclude file, if one exists
	pub fn user_exclude_file(&self) -> Option<PathBuf> {
		let path = self.control.path().join(&self.config.exclude_file);
		if path.is_file() {
			Some(path)
		} else {
			None
		}
	}

	/// Transfer endpoint of the local replica, with a trailing slash
	pub fn local_endpoint(&self) -> String {
		format!("{}/", self.root.display().to_string().trim_end_matches('/'))
	}

	/// Remote control directory, as given in the configuration
	pub fn remote_control_dir(&self) -> String {
		format!("{}/{}", self.config.remote_path.trim_end_matches('/'), CONTROL_DIR)
	}
}


// vim: ts=4
