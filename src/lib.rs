//! # PairSync - 2-way sync between a local and a remote directory
//!
//! PairSync keeps a local directory and a remote one (reachable over ssh, or
//! a plain local path) in sync without a server process. Every run records
//! the local tree, diffs it against the tree of the previous run, and drives
//! two rsync transfers: remote to local first, then local to remote. Paths
//! deleted locally since the last run are not fetched back; paths created
//! locally are never deleted as "missing on the other side".
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pairsync::config::SessionConfig;
//! use pairsync::session::{Collaborators, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(SessionConfig::load("/home/me/pocket")?);
//!     let session = Session::new(config.clone(), Collaborators::system(&config));
//!     let report = session.run().await?;
//!     println!("{} paths tracked", report.committed_paths);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod lock;
pub mod logging;
pub mod notifier;
pub mod orchestrator;
pub mod session;
pub mod snapshot;
pub mod transfer;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Config, SessionConfig};
pub use error::{ChannelError, StateError, SyncError};
pub use exclusion::Exclusions;
pub use session::{Collaborators, Session, SyncReport};
pub use snapshot::Snapshot;

// vim: ts=4
