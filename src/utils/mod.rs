//! Utility modules for common functionality

pub mod process;
pub mod shell;
pub mod signals;

// Re-export commonly used items
pub use process::GroupChild;
pub use shell::{quote, quote_path};
pub use signals::{ShutdownListener, ShutdownSignal};

// vim: ts=4
