use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::GenError;
use crate::GenResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["plcgen.toml", ".plcgen.toml", ".config/plcgen.toml"];

/// Default maximum number of instances generated per PLC.
pub const DEFAULT_MAX_INSTANCES: usize = 200;

/// Configuration loaded from a `plcgen.toml` file.
///
/// ```toml
/// workbook = "equipment.xlsx"
/// output = "generated"
/// templates = "templates"
/// status = "Released"
/// max_instances = 200
///
/// [sheets]
/// main = "Main"
/// config = "Config"
///
/// [tags]
/// culture = "en-US"
/// ```
///
/// Relative paths are resolved against the directory holding the config
/// file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlcgenConfig {
	/// Workbook file (`.xlsx`, `.xls`, `.ods`) or a directory of CSV sheets.
	#[serde(default = "default_workbook")]
	pub workbook: PathBuf,
	/// Directory receiving the generated sources.
	#[serde(default = "default_output")]
	pub output: PathBuf,
	/// Directory holding `<typeEq>.scl` templates of extended types and the
	/// sources referenced from the workbook.
	#[serde(default = "default_templates")]
	pub templates: PathBuf,
	/// Only main-sheet rows whose status cell contains this text are
	/// generated. Empty matches every row.
	#[serde(default)]
	pub status: String,
	/// Maximum number of instances generated per PLC.
	#[serde(default = "default_max_instances")]
	pub max_instances: usize,
	#[serde(default)]
	pub sheets: SheetsConfig,
	#[serde(default)]
	pub tags: TagsConfig,
}

impl Default for PlcgenConfig {
	fn default() -> Self {
		Self {
			workbook: default_workbook(),
			output: default_output(),
			templates: default_templates(),
			status: String::new(),
			max_instances: DEFAULT_MAX_INSTANCES,
			sheets: SheetsConfig::default(),
			tags: TagsConfig::default(),
		}
	}
}

/// Names of the fixed sheets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsConfig {
	#[serde(default = "default_main_sheet")]
	pub main: String,
	#[serde(default = "default_config_sheet")]
	pub config: String,
}

impl Default for SheetsConfig {
	fn default() -> Self {
		Self {
			main: default_main_sheet(),
			config: default_config_sheet(),
		}
	}
}

/// Settings of the exported tag tables.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagsConfig {
	/// Culture of the multilingual comments.
	#[serde(default = "default_culture")]
	pub culture: String,
}

impl Default for TagsConfig {
	fn default() -> Self {
		Self {
			culture: default_culture(),
		}
	}
}

fn default_workbook() -> PathBuf {
	PathBuf::from("equipment.xlsx")
}

fn default_output() -> PathBuf {
	PathBuf::from("generated")
}

fn default_templates() -> PathBuf {
	PathBuf::from("templates")
}

fn default_max_instances() -> usize {
	DEFAULT_MAX_INSTANCES
}

fn default_main_sheet() -> String {
	"Main".to_string()
}

fn default_config_sheet() -> String {
	"Config".to_string()
}

fn default_culture() -> String {
	"en-US".to_string()
}

impl PlcgenConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> GenResult<Option<PlcgenConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}

	pub fn parse(content: &str) -> GenResult<PlcgenConfig> {
		toml::from_str(content).map_err(|e| GenError::ConfigParse(e.to_string()))
	}

	/// Load the config at `root`, falling back to defaults, with every path
	/// made absolute against `root`.
	pub fn load_or_default(root: &Path) -> GenResult<PlcgenConfig> {
		let config = Self::load(root)?.unwrap_or_default();
		Ok(config.resolved(root))
	}

	/// Join relative paths onto `root`.
	#[must_use]
	pub fn resolved(mut self, root: &Path) -> Self {
		self.workbook = root.join(&self.workbook);
		self.output = root.join(&self.output);
		self.templates = root.join(&self.templates);
		self
	}
}
