//! The engineering tool that receives generated sources.
//!
//! The generator only talks to [`EngineeringBackend`]. [`ManifestBackend`]
//! records every request and writes them as JSON so an external importer (or
//! a test) can replay them.

use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::GenError;
use crate::GenResult;
use crate::patcher::write_atomic;

/// File name of the manifest written by [`ManifestBackend`].
pub const MANIFEST_FILE: &str = "import-manifest.json";

/// What a generated source defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
	Function,
	DataBlock,
	Type,
	InstanceDb,
	TagTable,
}

/// Request to import one generated source into a PLC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
	pub plc: String,
	pub name: String,
	pub path: PathBuf,
	/// Block number; `0` lets the tool assign one.
	pub number: u32,
	pub group: String,
	pub kind: SourceKind,
}

/// Operations the generator needs from the engineering tool.
pub trait EngineeringBackend {
	/// Create the block group `group` in `plc` if it does not exist.
	fn ensure_group(&mut self, plc: &str, group: &str) -> GenResult<()>;

	fn import_source(&mut self, request: &ImportRequest) -> GenResult<()>;

	fn block_exists(&self, plc: &str, name: &str) -> bool;

	fn compile_and_save(&mut self, plc: &str) -> GenResult<()>;

	/// Release the tool. No other method is called afterwards.
	fn close(&mut self) -> GenResult<()>;
}

/// Everything requested for one PLC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcManifest {
	pub groups: Vec<String>,
	pub imports: Vec<ImportRequest>,
	pub compiled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
	pub plcs: IndexMap<String, PlcManifest>,
}

/// Backend recording requests into a [`Manifest`].
#[derive(Debug, Clone, Default)]
pub struct ManifestBackend {
	path: Option<PathBuf>,
	manifest: Manifest,
	closed: bool,
}

impl ManifestBackend {
	/// Backend writing its manifest to `path` on [`EngineeringBackend::close`].
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: Some(path.into()),
			..Self::default()
		}
	}

	/// Backend that only keeps the manifest in memory.
	pub fn in_memory() -> Self {
		Self::default()
	}

	pub fn manifest(&self) -> &Manifest {
		&self.manifest
	}

	pub fn path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	fn plc(&mut self, plc: &str) -> &mut PlcManifest {
		self.manifest.plcs.entry(plc.to_string()).or_default()
	}

	fn ensure_open(&self, operation: &'static str, target: &str) -> GenResult<()> {
		if self.closed {
			return Err(GenError::Backend {
				operation,
				target: target.to_string(),
				reason: "backend is closed".to_string(),
			});
		}

		Ok(())
	}
}

impl EngineeringBackend for ManifestBackend {
	fn ensure_group(&mut self, plc: &str, group: &str) -> GenResult<()> {
		self.ensure_open("ensure_group", group)?;
		if group.is_empty() {
			return Ok(());
		}

		let groups = &mut self.plc(plc).groups;
		if !groups.iter().any(|existing| existing == group) {
			groups.push(group.to_string());
		}

		Ok(())
	}

	fn import_source(&mut self, request: &ImportRequest) -> GenResult<()> {
		self.ensure_open("import_source", &request.name)?;
		let imports = &mut self.plc(&request.plc).imports;

		match imports.iter_mut().find(|existing| existing.path == request.path) {
			Some(existing) => *existing = request.clone(),
			None => imports.push(request.clone()),
		}

		Ok(())
	}

	fn block_exists(&self, plc: &str, name: &str) -> bool {
		self.manifest
			.plcs
			.get(plc)
			.is_some_and(|manifest| manifest.imports.iter().any(|import| import.name == name))
	}

	fn compile_and_save(&mut self, plc: &str) -> GenResult<()> {
		self.ensure_open("compile_and_save", plc)?;
		self.plc(plc).compiled = true;
		Ok(())
	}

	fn close(&mut self) -> GenResult<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;

		let Some(path) = &self.path else {
			return Ok(());
		};

		let payload = serde_json::to_string_pretty(&self.manifest).map_err(|e| {
			GenError::Backend {
				operation: "close",
				target: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;
		write_atomic(path, &format!("{payload}\n"))?;
		tracing::info!(path = %path.display(), plcs = self.manifest.plcs.len(), "wrote import manifest");

		Ok(())
	}
}
