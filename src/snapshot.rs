//! Tree snapshots of the local replica
//!
//! A snapshot is the byte-wise sorted list of every path below the replica
//! root, relative and `/`-separated. It is stored one path per line in the
//! control directory: `tree-current` while a session runs, promoted to
//! `tree-previous` once both transfers succeeded.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StateError;
use crate::logging::*;

/// Sorted, de-duplicated listing of relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
	paths: Vec<String>,
}

impl Snapshot {
	/// Build a snapshot from arbitrary paths
	pub fn from_paths<I, S>(paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
		// String ordering is byte-wise, independent of locale
		paths.sort_unstable();
		paths.dedup();
		Snapshot { paths }
	}

	/// Walk `root` and list everything except the top-level `control_dir`
	pub fn scan(root: &Path, control_dir: &str) -> Result<Self, StateError> {
		let mut paths = Vec::new();
		scan_dir(root, "", Some(control_dir), &mut paths)?;
		Ok(Snapshot::from_paths(paths))
	}

	/// Load a snapshot file, None if there is none yet
	///
	/// A missing file and an empty one differ: the first means no session
	/// ever completed, the second a completed session on an empty tree.
	pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
		let text = match fs::read_to_string(path) {
			Ok(text) => text,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!("No snapshot at {}", path.display());
				return Ok(None);
			}
			Err(e) => return Err(StateError::LoadFailed { path: path.to_path_buf(), source: e }),
		};

		let paths: Vec<String> =
			text.lines().filter(|l| !l.is_empty()).map(str::to_string).collect();
		let sorted = paths.windows(2).all(|w| w[0] < w[1]);
		if !sorted {
			warn!("Snapshot {} is not sorted; re-sorting it", path.display());
		}
		Ok(Some(Snapshot::from_paths(paths)))
	}

	/// Write the snapshot through a temporary file and rename it into place
	pub fn save(&self, path: &Path) -> Result<(), StateError> {
		let fail = |source| StateError::SaveFailed { path: path.to_path_buf(), source };
		let tmp = tmp_sibling(path);
		{
			let mut file = io::BufWriter::new(fs::File::create(&tmp).map_err(fail)?);
			for p in &self.paths {
				file.write_all(p.as_bytes()).map_err(fail)?;
				file.write_all(b"\n").map_err(fail)?;
			}
			file.into_inner().map_err(|e| fail(e.into_error()))?.sync_all().map_err(fail)?;
		}
		fs::rename(&tmp, path).map_err(fail)
	}

	/// Promote the `current` snapshot file to `previous`
	pub fn promote(current: &Path, previous: &Path) -> Result<(), StateError> {
		fs::rename(current, previous)
			.map_err(|e| StateError::SaveFailed { path: previous.to_path_buf(), source: e })
	}

	pub fn paths(&self) -> &[String] {
		&self.paths
	}

	pub fn len(&self) -> usize {
		self.paths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.paths.is_empty()
	}

	pub fn contains(&self, path: &str) -> bool {
		self.paths.binary_search_by(|p| p.as_str().cmp(path)).is_ok()
	}
}

fn tmp_sibling(path: &Path) -> PathBuf {
	let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	name.push(".tmp");
	path.with_file_name(name)
}

fn scan_dir(
	dir: &Path,
	prefix: &str,
	skip: Option<&str>,
	paths: &mut Vec<String>,
) -> Result<(), StateError> {
	let scan_failed = |source| StateError::ScanFailed { path: dir.to_path_buf(), source };
	for entry in fs::read_dir(dir).map_err(scan_failed)? {
		let entry = entry.map_err(scan_failed)?;
		let name = entry.file_name();
		let name = match name.to_str() {
			Some(name) if !name.contains('\n') => name.to_string(),
			_ => {
				warn!("Skipping unrepresentable name {:?} in {}", name, dir.display());
				continue;
			}
		};
		if skip == Some(name.as_str()) {
			continue;
		}

		let relative = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
		// file_type() does not follow symlinks
		let file_type = entry
			.file_type()
			.map_err(|e| StateError::ScanFailed { path: entry.path(), source: e })?;
		if file_type.is_dir() {
			scan_dir(&entry.path(), &relative, None, paths)?;
		}
		paths.push(relative);
	}
	Ok(())
}


// vim: ts=4
