use clap::error::ErrorKind;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;

use pairsync::commands;
use pairsync::config::ControlDir;
use pairsync::error::{SyncError, EXIT_FAILURE};
use pairsync::logging::{self, error};

fn cli() -> Command {
	Command::new("pairsync")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("2-way sync between a local directory and a remote one")
		.arg(
			Arg::new("dir")
				.short('C')
				.long("dir")
				.value_name("DIR")
				.default_value(".")
				.global(true)
				.help("Local replica root"),
		)
		.subcommand(
			Command::new("init")
				.about("Initialize the current directory as a replica")
				.arg(Arg::new("host").required(true).help("Remote host, \"\" for a local path"))
				.arg(Arg::new("path").required(true).help("Remote replica path")),
		)
		.subcommand(Command::new("log").about("Follow the log of scheduled syncs"))
		.subcommand(Command::new("cron").about("Sync with output going to the log file"))
		.subcommand(Command::new("sync").about("Sync once (default)"))
}

fn exit_with(err: &SyncError) -> ExitCode {
	error!("{}", err);
	ExitCode::from(err.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = match cli().try_get_matches() {
		Ok(matches) => matches,
		Err(e) => {
			let _ = e.print();
			return match e.kind() {
				ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
				_ => ExitCode::from(EXIT_FAILURE),
			};
		}
	};
	let root = matches.get_one::<String>("dir").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

	match matches.subcommand() {
		Some(("init", sub)) => {
			logging::init_tracing();
			let host = sub.get_one::<String>("host").map(String::as_str).unwrap_or_default();
			let path = sub.get_one::<String>("path").map(String::as_str).unwrap_or_default();
			match commands::init(&root, host, path) {
				Ok(()) => ExitCode::SUCCESS,
				Err(e) => exit_with(&e),
			}
		}
		Some(("log", _)) => {
			logging::init_tracing();
			match commands::log(&root).await {
				Ok(()) => ExitCode::SUCCESS,
				Err(e) => exit_with(&e),
			}
		}
		Some(("cron", _)) => {
			let control = ControlDir::new(&root);
			if !control.is_initialized() {
				logging::init_tracing();
				return exit_with(&SyncError::NotInitialized { path: control.path().to_path_buf() });
			}
			if let Err(e) = logging::init_file_tracing(&control.log_file()) {
				logging::init_tracing();
				return exit_with(&SyncError::Io(e));
			}
			match commands::cron(&root).await {
				Ok(_) => ExitCode::SUCCESS,
				Err(e) => ExitCode::from(e.exit_code()),
			}
		}
		_ => {
			logging::init_tracing();
			match commands::sync(&root).await {
				Ok(_) => ExitCode::SUCCESS,
				Err(e) => exit_with(&e),
			}
		}
	}
}

// vim: ts=4
