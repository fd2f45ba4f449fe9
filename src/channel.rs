//! Remote-execution channel for commands run next to the remote replica
//!
//! With a configured host, commands go through ssh; without one they are run
//! by a local `sh -c`, which lets the remote replica live on a mounted or
//! local path.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ChannelError;
use crate::logging::*;

/// Result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code, None when killed by a signal
	pub status: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	pub fn success(&self) -> bool {
		self.status == Some(0)
	}

	/// Short human-readable reason for a failed command
	pub fn failure_reason(&self) -> String {
		let stderr = self.stderr.trim();
		match (self.status, stderr.is_empty()) {
			(Some(code), true) => format!("exit status {}", code),
			(Some(code), false) => format!("exit status {}: {}", code, stderr),
			(None, true) => "terminated by signal".to_string(),
			(None, false) => format!("terminated by signal: {}", stderr),
		}
	}
}

/// Runs shell commands on the remote replica's side
#[async_trait]
pub trait RemoteChannel: Send + Sync {
	/// Execute a shell command and collect its output
	async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError>;

	/// Where commands are executed, for log messages
	fn describe(&self) -> String;
}

/// Executes commands on a host through ssh
#[derive(Debug, Clone)]
pub struct SshChannel {
	ssh_command: Vec<String>,
	host: String,
}

impl SshChannel {
	/// `ssh_command` is split on whitespace, e.g. `ssh -p 2222`
	pub fn new(ssh_command: &str, host: &str) -> Self {
		SshChannel {
			ssh_command: ssh_command.split_whitespace().map(str::to_string).collect(),
			host: host.to_string(),
		}
	}
}

#[async_trait]
impl RemoteChannel for SshChannel {
	async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
		let (program, args) = self.ssh_command.split_first().ok_or(ChannelError::EmptyCommand)?;
		debug!("ssh {}: {}", self.host, command);
		let output = tokio::process::Command::new(program)
			.args(args)
			.arg(&self.host)
			.arg(command)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|e| ChannelError::SshFailed { host: self.host.clone(), source: e })?;
		Ok(CommandOutput {
			status: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}

	fn describe(&self) -> String {
		format!("ssh {}", self.host)
	}
}

/// Executes commands with a local `sh -c`
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

#[async_trait]
impl RemoteChannel for LocalShell {
	async fn execute(&self, command: &str) -> Result<CommandOutput, ChannelError> {
		debug!("sh -c: {}", command);
		let output = tokio::process::Command::new("sh")
			.arg("-c")
			.arg(command)
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|e| ChannelError::SpawnFailed { cmd: "sh -c".to_string(), source: e })?;
		Ok(CommandOutput {
			status: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}

	fn describe(&self) -> String {
		"local shell".to_string()
	}
}

/// Pick the channel matching the configuration
pub fn from_config(config: &Config) -> Arc<dyn RemoteChannel> {
	match config.host() {
		Some(host) => Arc::new(SshChannel::new(&config.ssh_command, host)),
		None => Arc::new(LocalShell),
	}
}


// vim: ts=4
