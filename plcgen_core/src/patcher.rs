//! Idempotent, marker-based patching of generated sources.
//!
//! Generated fragments live in named regions (`REGION Call <kind> <key>` ...
//! `END_REGION`) inside shared function sources. Upserting a region first
//! removes any previous copy, then inserts the new lines immediately before
//! `END_FUNCTION`, so re-running with the same fragment yields a
//! byte-identical file.
//!
//! Everything here is a pure text transformation except [`write_atomic`] and
//! [`read_optional`], the file shims used by the workspace.

use std::io::ErrorKind;
use std::path::Path;

use crate::GenResult;

/// Prefix of every region header produced by the generator.
pub const REGION_CALL: &str = "REGION Call";
pub const END_REGION: &str = "END_REGION";
pub const END_FUNCTION: &str = "END_FUNCTION";

/// Result of [`upsert_region`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
	/// The patched text, `\n` separated with a trailing newline.
	pub text: String,
	/// Number of previous copies of the region that were removed.
	pub removed: usize,
	/// Whether the new lines were inserted. `false` when the text has no
	/// `END_FUNCTION` line.
	pub inserted: bool,
}

/// Whether `line` opens the generated region identified by `key`.
///
/// The trimmed line must start with `REGION Call` and end with the key as a
/// whole whitespace-delimited suffix, so keys may contain spaces and `P1`
/// never matches the region of `P10`.
pub fn is_region_header(line: &str, key: &str) -> bool {
	let trimmed = line.trim();
	if !trimmed.starts_with(REGION_CALL) || key.is_empty() {
		return false;
	}

	trimmed
		.strip_suffix(key)
		.is_some_and(|head| head.ends_with(char::is_whitespace))
}

/// Remove every region identified by `key`, each through the next
/// `END_REGION` line. Returns the remaining lines and the number of regions
/// removed.
pub fn remove_region<'a>(text: &'a str, key: &str) -> (Vec<&'a str>, usize) {
	let mut kept = Vec::new();
	let mut removed = 0;
	let mut skipping = false;

	for line in text.lines() {
		if skipping {
			if line.contains(END_REGION) {
				skipping = false;
			}
			continue;
		}

		if is_region_header(line, key) {
			skipping = true;
			removed += 1;
			continue;
		}

		kept.push(line);
	}

	(kept, removed)
}

/// Replace the region identified by `key` with `new_lines`, placed directly
/// before the first `END_FUNCTION` line.
pub fn upsert_region(text: &str, key: &str, new_lines: &[String]) -> PatchOutcome {
	let (kept, removed) = remove_region(text, key);
	let mut output: Vec<&str> = Vec::with_capacity(kept.len() + new_lines.len());
	let mut inserted = false;

	for line in kept {
		if !inserted && line.contains(END_FUNCTION) {
			output.extend(new_lines.iter().map(String::as_str));
			inserted = true;
		}
		output.push(line);
	}

	if !inserted {
		tracing::warn!(key, "no END_FUNCTION line; region not inserted");
	}

	PatchOutcome {
		text: join_lines(&output),
		removed,
		inserted,
	}
}

/// Replace the `FUNCTION "<name>" ... END_FUNCTION` block of an aggregated
/// source with `block`, or append `block` when the function is not present
/// yet. Other functions in the source are left untouched.
pub fn upsert_function_block(text: &str, name: &str, block: &str) -> String {
	let header = format!("FUNCTION \"{name}\"");
	let lines: Vec<&str> = text.lines().collect();
	let start = lines
		.iter()
		.position(|line| line.trim_start().starts_with(&header));

	let mut output: Vec<&str> = Vec::with_capacity(lines.len() + block.lines().count());

	match start {
		Some(start) => {
			let end = lines[start..]
				.iter()
				.position(|line| line.trim_start().starts_with(END_FUNCTION))
				.map_or(lines.len(), |offset| start + offset + 1);

			output.extend_from_slice(&lines[..start]);
			output.extend(block.lines());
			output.extend_from_slice(&lines[end..]);
		}
		None => {
			output.extend_from_slice(&lines);
			if output.last().is_some_and(|line| !line.trim().is_empty()) {
				output.push("");
			}
			output.extend(block.lines());
		}
	}

	join_lines(&output)
}

fn join_lines(lines: &[&str]) -> String {
	let mut text = lines.join("\n");
	text.push('\n');
	text
}

/// Read a file, returning `None` when it does not exist.
pub fn read_optional(path: &Path) -> GenResult<Option<String>> {
	match std::fs::read_to_string(path) {
		Ok(content) => Ok(Some(content)),
		Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
		Err(error) => Err(error.into()),
	}
}

/// Write `content` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, content: &str) -> GenResult<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}

	let file_name = path
		.file_name()
		.map_or_else(|| "generated".into(), |name| name.to_string_lossy());
	let temp_path = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));

	std::fs::write(&temp_path, content)?;
	if let Err(error) = std::fs::rename(&temp_path, path) {
		let _ = std::fs::remove_file(&temp_path);
		return Err(error.into());
	}

	Ok(())
}
