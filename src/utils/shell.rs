//! POSIX shell quoting for commands sent over the remote channel

/// Quote a word for `sh`, using single quotes
pub fn quote(word: &str) -> String {
	if !word.is_empty()
		&& word.chars().all(|c| c.is_ascii_alphanumeric() || "-_./,:=+@%".contains(c))
	{
		return word.to_string();
	}
	format!("'{}'", word.replace('\'', "'\\''"))
}

/// Quote a path, keeping a leading `~/` expandable by the remote shell
pub fn quote_path(path: &str) -> String {
	if path == "~" {
		return "\"$HOME\"".to_string();
	}
	match path.strip_prefix("~/") {
		Some(rest) if rest.is_empty() => "\"$HOME\"/".to_string(),
		Some(rest) => format!("\"$HOME\"/{}", quote(rest)),
		None => quote(path),
	}
}


// vim: ts=4
