//! Parsing of rsync `--itemize-changes` output

use std::fmt;

/// Kind of change reported for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	/// File content sent or received
	Transferred,
	/// Created locally on the receiver (directory, symlink, device)
	Created,
	/// Only attributes changed
	Attributes,
	/// Hard link created
	HardLink,
	/// Removed from the receiver
	Deleted,
}

/// One line of itemized output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemizedChange {
	pub kind: ChangeKind,
	pub path: String,
}

impl ItemizedChange {
	/// Parse one output line, None for anything that is not an item
	///
	/// Items look like `>f+++++++++ path` (11 flag characters, a space and the
	/// path) or `*deleting   path`.
	pub fn parse(line: &str) -> Option<Self> {
		let line = line.trim_end_matches(&['\r', '\n'][..]);
		if let Some(rest) = line.strip_prefix("*deleting") {
			let path = rest.trim_start();
			if path.is_empty() {
				return None;
			}
			return Some(ItemizedChange { kind: ChangeKind::Deleted, path: path.to_string() });
		}

		let flags = line.get(..11)?;
		let path = line.get(12..)?;
		if line.as_bytes().get(11) != Some(&b' ') || path.is_empty() {
			return None;
		}
		let mut chars = flags.chars();
		let update = chars.next()?;
		let file_type = chars.next()?;
		if !"fdLDS".contains(file_type) {
			return None;
		}
		let kind = match update {
			'<' | '>' => ChangeKind::Transferred,
			'c' => ChangeKind::Created,
			'h' => ChangeKind::HardLink,
			'.' => ChangeKind::Attributes,
			_ => return None,
		};
		Some(ItemizedChange { kind, path: path.to_string() })
	}
}

impl fmt::Display for ItemizedChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let verb = match self.kind {
			ChangeKind::Transferred => "transferred",
			ChangeKind::Created => "created",
			ChangeKind::Attributes => "attributes",
			ChangeKind::HardLink => "hard link",
			ChangeKind::Deleted => "deleted",
		};
		write!(f, "{:<11} {}", verb, self.path)
	}
}


// vim: ts=4
