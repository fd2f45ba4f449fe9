//! Exclusion sets derived from two snapshots, and their rsync filter rules

use std::cmp::Ordering;
use std::fmt;

use crate::snapshot::Snapshot;

/// Paths withheld from the transfers of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
	/// Deleted locally since the last session: never fetched back
	pub hide_from_incoming: Vec<String>,

	/// Created locally since the last session: never deleted as "missing"
	pub hide_from_outgoing_delete: Vec<String>,
}

impl Exclusions {
	/// Diff two sorted snapshots in one merge pass
	pub fn build(previous: &Snapshot, current: &Snapshot) -> Self {
		let (prev, cur) = (previous.paths(), current.paths());
		let mut exclusions = Exclusions::default();
		let (mut i, mut j) = (0, 0);

		while i < prev.len() && j < cur.len() {
			match prev[i].cmp(&cur[j]) {
				Ordering::Less => {
					exclusions.hide_from_incoming.push(prev[i].clone());
					i += 1;
				}
				Ordering::Greater => {
					exclusions.hide_from_outgoing_delete.push(cur[j].clone());
					j += 1;
				}
				Ordering::Equal => {
					i += 1;
					j += 1;
				}
			}
		}
		exclusions.hide_from_incoming.extend_from_slice(&prev[i..]);
		exclusions.hide_from_outgoing_delete.extend_from_slice(&cur[j..]);
		exclusions
	}

	pub fn is_empty(&self) -> bool {
		self.hide_from_incoming.is_empty() && self.hide_from_outgoing_delete.is_empty()
	}
}

/// What a filter rule does on the receiving side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
	/// Neither transferred nor deleted
	Exclude,
	/// Transferred, but never deleted on the receiver
	Protect,
}

/// One rsync filter rule anchored at the transfer root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
	pub action: RuleAction,
	pub pattern: String,
}

impl FilterRule {
	pub fn exclude(path: &str) -> Self {
		FilterRule { action: RuleAction::Exclude, pattern: anchored_pattern(path) }
	}

	pub fn protect(path: &str) -> Self {
		FilterRule { action: RuleAction::Protect, pattern: anchored_pattern(path) }
	}

	/// Whether the rule matches exactly this relative path
	pub fn targets(&self, path: &str) -> bool {
		self.pattern == anchored_pattern(path)
	}
}

impl fmt::Display for FilterRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.action {
			RuleAction::Exclude => write!(f, "- {}", self.pattern),
			RuleAction::Protect => write!(f, "P {}", self.pattern),
		}
	}
}

const WILDCARDS: &[char] = &['*', '?', '['];

/// Anchor a relative path at the transfer root
///
/// rsync only honours backslash escapes in patterns that contain wildcards,
/// so escaping is applied only then.
pub fn anchored_pattern(path: &str) -> String {
	let mut pattern = String::with_capacity(path.len() + 1);
	pattern.push('/');
	if path.contains(WILDCARDS) {
		for c in path.chars() {
			if c == '\\' || WILDCARDS.contains(&c) {
				pattern.push('\\');
			}
			pattern.push(c);
		}
	} else {
		pattern.push_str(path);
	}
	pattern
}


// vim: ts=4
