use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::Path;
use std::path::PathBuf;

use crate::GenResult;
use crate::patcher::read_optional;
use crate::patcher::write_atomic;

/// A file whose content differs from what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
	pub path: PathBuf,
	/// Content on disk before the run, `None` for new files.
	pub original: Option<String>,
	pub content: String,
}

impl FileChange {
	pub fn is_new(&self) -> bool {
		self.original.is_none()
	}
}

#[derive(Debug, Clone)]
struct Tracked {
	original: Option<String>,
	current: Option<String>,
}

/// In-memory overlay of the output tree.
///
/// Files are read from disk the first time they are touched and every edit
/// stays in memory until [`Workspace::commit`], so a whole run can be
/// previewed before anything is written.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
	entries: BTreeMap<PathBuf, Tracked>,
}

impl Workspace {
	pub fn new() -> Self {
		Self::default()
	}

	fn entry(&mut self, path: &Path) -> GenResult<&mut Tracked> {
		let tracked = match self.entries.entry(path.to_path_buf()) {
			btree_map::Entry::Occupied(entry) => entry.into_mut(),
			btree_map::Entry::Vacant(entry) => {
				let original = read_optional(path)?;
				entry.insert(Tracked {
					current: original.clone(),
					original,
				})
			}
		};

		Ok(tracked)
	}

	/// Current content of `path`, `None` when it does not exist yet.
	pub fn read(&mut self, path: &Path) -> GenResult<Option<String>> {
		Ok(self.entry(path)?.current.clone())
	}

	pub fn exists(&mut self, path: &Path) -> GenResult<bool> {
		Ok(self.entry(path)?.current.is_some())
	}

	/// Replace the content of `path`. A file that cannot be read is tracked as
	/// new and overwritten on commit.
	pub fn write(&mut self, path: &Path, content: String) {
		match self.entries.entry(path.to_path_buf()) {
			btree_map::Entry::Occupied(mut entry) => entry.get_mut().current = Some(content),
			btree_map::Entry::Vacant(entry) => {
				let original = read_optional(path).unwrap_or_else(|error| {
					tracing::debug!(path = %path.display(), %error, "unreadable file will be replaced");
					None
				});
				entry.insert(Tracked {
					original,
					current: Some(content),
				});
			}
		}
	}

	/// Files whose content differs from disk, sorted by path.
	pub fn changes(&self) -> Vec<FileChange> {
		self.entries
			.iter()
			.filter_map(|(path, entry)| {
				let content = entry.current.as_ref()?;
				(entry.original.as_ref() != Some(content)).then(|| {
					FileChange {
						path: path.clone(),
						original: entry.original.clone(),
						content: content.clone(),
					}
				})
			})
			.collect()
	}

	/// Write every changed file. Returns the number of files written.
	pub fn commit(&mut self) -> GenResult<usize> {
		let changes = self.changes();
		for change in &changes {
			write_atomic(&change.path, &change.content)?;
			tracing::debug!(path = %change.path.display(), new = change.is_new(), "wrote file");
			if let Some(entry) = self.entries.get_mut(&change.path) {
				entry.original = Some(change.content.clone());
			}
		}

		Ok(changes.len())
	}
}
