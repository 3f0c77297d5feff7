use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum GenError {
	#[error(transparent)]
	#[diagnostic(code(plcgen::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to open workbook `{path}`: {reason}")]
	#[diagnostic(
		code(plcgen::workbook_open),
		help("supported workbooks: .xlsx, .xlsm, .xls, .ods files or a directory of <sheet>.csv files")
	)]
	WorkbookOpen { path: String, reason: String },

	#[error("sheet `{0}` not found in workbook")]
	#[diagnostic(
		code(plcgen::missing_sheet),
		help("check the `[sheets]` table in plcgen.toml")
	)]
	MissingSheet(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(plcgen::config_parse),
		help("check that plcgen.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("template for `{owner}` not found at `{path}`")]
	#[diagnostic(
		code(plcgen::missing_template),
		help("extended equipment types need a `<typeEq>.scl` file in the templates directory")
	)]
	MissingTemplate { owner: String, path: String },

	#[error("block `{block}` in sheet `{sheet}` has a non-numeric anchor cell: `{value}`")]
	#[diagnostic(code(plcgen::schema_parse))]
	SchemaParse {
		sheet: String,
		block: String,
		value: String,
	},

	#[error("invalid value `{value}` for `{field}` in sheet `{sheet}` row {row}")]
	#[diagnostic(code(plcgen::row_field_parse))]
	RowFieldParse {
		sheet: String,
		row: usize,
		field: &'static str,
		value: String,
	},

	#[error("failed to read tag table: {0}")]
	#[diagnostic(
		code(plcgen::xml),
		help("delete the generated tag table to have it rebuilt from the workbook")
	)]
	Xml(String),

	#[error("backend operation `{operation}` failed for `{target}`: {reason}")]
	#[diagnostic(code(plcgen::backend))]
	Backend {
		operation: &'static str,
		target: String,
		reason: String,
	},
}

impl From<quick_xml::Error> for GenError {
	fn from(error: quick_xml::Error) -> Self {
		Self::Xml(error.to_string())
	}
}

pub type GenResult<T> = Result<T, GenError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
