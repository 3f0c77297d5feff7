//! Compile-time layout of the workbook tables.
//!
//! Each table is a coordinate block: the anchor cell holds the table's title
//! row, the cell to its right holds the record count. The title row is
//! followed by one header row, then `count` record rows. Record columns start
//! at the anchor column; the per-kind offsets live in [`columns`].

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use crate::GenError;
use crate::GenResult;
use crate::VariantSet;
use crate::tabular::Sheet;

/// Row holding the column headers of the main sheet.
pub const MAIN_HEADER_ROW: usize = 2;
/// First data row of the main sheet.
pub const MAIN_FIRST_ROW: usize = 3;
/// Cell of an equipment sheet flagging the type as extended.
pub const EXTENDED_MARKER: CellRef = CellRef::new(1, 2);

/// A 1-indexed cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
	pub row: usize,
	pub column: usize,
}

impl CellRef {
	pub const fn new(row: usize, column: usize) -> Self {
		Self { row, column }
	}
}

/// Every table the extractor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
	FunctionTemplate,
	SharedSupportDb,
	UserConstant,
	ExtendedFcValue,
	LibraryFb,
	Tag,
	Parameter,
	ExtendedSupport,
	Constant,
	SupportDb,
	DbValue,
}

impl BlockKind {
	pub const CONFIG: [Self; 4] = [
		Self::FunctionTemplate,
		Self::SharedSupportDb,
		Self::UserConstant,
		Self::ExtendedFcValue,
	];
	pub const EQUIPMENT: [Self; 7] = [
		Self::LibraryFb,
		Self::Tag,
		Self::Parameter,
		Self::ExtendedSupport,
		Self::Constant,
		Self::SupportDb,
		Self::DbValue,
	];

	pub const fn anchor(self) -> CellRef {
		match self {
			Self::FunctionTemplate | Self::LibraryFb => CellRef::new(2, 1),
			Self::Tag => CellRef::new(2, 3),
			Self::SharedSupportDb => CellRef::new(2, 6),
			Self::Parameter => CellRef::new(2, 10),
			Self::ExtendedSupport => CellRef::new(2, 14),
			Self::UserConstant => CellRef::new(2, 16),
			Self::Constant => CellRef::new(2, 20),
			Self::ExtendedFcValue => CellRef::new(2, 21),
			Self::SupportDb => CellRef::new(2, 24),
			Self::DbValue => CellRef::new(2, 32),
		}
	}

	/// Whether this equipment table is read for a type with the given
	/// extended flag. Configuration tables are always read.
	pub const fn read_for(self, extended: bool) -> bool {
		match self {
			Self::LibraryFb | Self::Parameter => !extended,
			Self::ExtendedSupport => extended,
			_ => true,
		}
	}

	pub const fn label(self) -> &'static str {
		match self {
			Self::FunctionTemplate => "function templates",
			Self::SharedSupportDb => "shared support blocks",
			Self::UserConstant => "user constants",
			Self::ExtendedFcValue => "extended fc values",
			Self::LibraryFb => "library blocks",
			Self::Tag => "tags",
			Self::Parameter => "parameters",
			Self::ExtendedSupport => "extended support blocks",
			Self::Constant => "constants",
			Self::SupportDb => "support blocks",
			Self::DbValue => "db values",
		}
	}
}

impl fmt::Display for BlockKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// Column offsets, relative to the anchor column, of each table.
pub mod columns {
	/// Absolute columns of the main sheet.
	pub mod main {
		pub const PLC: usize = 1;
		pub const STATUS: usize = 2;
		pub const TYPE_EQ: usize = 3;
		pub const EQ_NAME: usize = 4;
		pub const NUMBER: usize = 5;
		pub const GROUP: usize = 6;
		pub const FUNCTION: usize = 7;
		pub const VARIANTS: usize = 8;
	}

	pub mod function_template {
		pub const PLC: usize = 0;
		pub const NAME: usize = 1;
		pub const GROUP: usize = 2;
		pub const SOURCE: usize = 3;
	}

	/// Shared support blocks use these offsets shifted by one for the PLC
	/// column.
	pub mod support_db {
		pub const NAME: usize = 0;
		pub const NUMBER: usize = 1;
		pub const GROUP: usize = 2;
		pub const CATEGORY: usize = 3;
		pub const SOURCE: usize = 4;
		pub const IS_TYPE: usize = 5;
		pub const IS_RETAIN: usize = 6;
		pub const IS_OPTIMIZED: usize = 7;
	}

	/// Shared user constants use these offsets shifted by one for the PLC
	/// column.
	pub mod constant {
		pub const NAME: usize = 0;
		pub const TYPE: usize = 1;
		pub const VALUE: usize = 2;
		pub const COMMENT: usize = 3;
	}

	pub mod extended_fc_value {
		pub const PLC: usize = 0;
		pub const FUNCTION: usize = 1;
		pub const SECTION: usize = 2;
		pub const NAME: usize = 3;
		pub const TYPE: usize = 4;
		pub const DEFAULT: usize = 5;
		pub const COMMENT: usize = 6;
	}

	pub mod library_fb {
		pub const NAME: usize = 0;
		pub const PATH: usize = 1;
	}

	pub mod tag {
		pub const NAME: usize = 0;
		pub const LINK: usize = 1;
		pub const TYPE: usize = 2;
		pub const ADDRESS: usize = 3;
		pub const TABLE: usize = 4;
		pub const COMMENT: usize = 5;
		pub const VARIANTS: usize = 6;
	}

	pub mod parameter {
		pub const NAME: usize = 0;
		pub const DIRECTION: usize = 1;
		pub const VALUE: usize = 2;
		pub const VARIANTS: usize = 3;
	}

	pub mod extended_support {
		pub const NAME: usize = 0;
		pub const OFFSET: usize = 1;
		pub const GROUP: usize = 2;
		pub const CATEGORY: usize = 3;
		pub const SOURCE: usize = 4;
		pub const VARIANTS: usize = 5;
	}

	pub mod db_value {
		pub const DATA_BLOCK: usize = 0;
		pub const MEMBER: usize = 1;
		pub const TYPE: usize = 2;
		pub const VARIANTS: usize = 3;
	}
}

/// A resolved table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateBlock {
	pub start_row: usize,
	pub count: usize,
	pub column: usize,
}

impl CoordinateBlock {
	/// Read the anchor of `kind` from `sheet`.
	///
	/// Returns `Ok(None)` for an empty table (`count <= 0`) and an error when
	/// either anchor cell is not an integer. The record count is capped at the
	/// last used row of the sheet.
	pub fn resolve(sheet: &Sheet, kind: BlockKind) -> GenResult<Option<Self>> {
		let anchor = kind.anchor();
		let parse = |column: usize| {
			let value = sheet.cell(anchor.row, column).trim();
			parse_integer(value).ok_or_else(|| {
				GenError::SchemaParse {
					sheet: sheet.name().to_string(),
					block: kind.label().to_string(),
					value: value.to_string(),
				}
			})
		};

		let start_row = parse(anchor.column)?;
		let count = parse(anchor.column + 1)?;

		if count <= 0 || start_row < 0 {
			return Ok(None);
		}

		let start_row = usize::try_from(start_row).unwrap_or(usize::MAX);
		let declared = usize::try_from(count).unwrap_or(usize::MAX);
		let available = (sheet.last_used_row() + 1).saturating_sub(start_row.saturating_add(2));
		let count = declared.min(available);
		if count < declared {
			tracing::debug!(sheet = sheet.name(), %kind, declared, count, "record count exceeds the used rows");
		}
		if count == 0 {
			return Ok(None);
		}

		Ok(Some(Self {
			start_row,
			count,
			column: anchor.column,
		}))
	}

	/// The 1-indexed record rows.
	pub fn rows(&self) -> Range<usize> {
		let first = self.start_row.saturating_add(2);
		first..first.saturating_add(self.count)
	}
}

/// Accessor for one record row of a table.
#[derive(Debug, Clone, Copy)]
pub struct RowReader<'a> {
	sheet: &'a Sheet,
	row: usize,
	column: usize,
}

impl<'a> RowReader<'a> {
	pub fn new(sheet: &'a Sheet, row: usize, column: usize) -> Self {
		Self { sheet, row, column }
	}

	pub fn row(&self) -> usize {
		self.row
	}

	/// The same row read from `columns` further to the right.
	pub fn shifted(&self, columns: usize) -> Self {
		Self {
			column: self.column + columns,
			..*self
		}
	}

	/// Trimmed text at `offset` from the first record column.
	pub fn text(&self, offset: usize) -> &'a str {
		self.sheet.cell(self.row, self.column + offset).trim()
	}

	/// Non-empty text at `offset`.
	pub fn required(&self, offset: usize, field: &'static str) -> GenResult<&'a str> {
		let value = self.text(offset);
		if value.is_empty() {
			return Err(self.field_error(field, value));
		}

		Ok(value)
	}

	/// Unsigned number at `offset`; an empty cell reads as `0`.
	pub fn number(&self, offset: usize, field: &'static str) -> GenResult<u32> {
		let value = self.text(offset);
		if value.is_empty() {
			return Ok(0);
		}

		parse_integer(value)
			.and_then(|n| u32::try_from(n).ok())
			.ok_or_else(|| self.field_error(field, value))
	}

	pub fn flag(&self, offset: usize) -> bool {
		parse_flag(self.text(offset))
	}

	pub fn variants(&self, offset: usize) -> VariantSet {
		VariantSet::parse(self.text(offset))
	}

	pub fn path(&self, offset: usize) -> Option<PathBuf> {
		let value = self.text(offset);
		(!value.is_empty()).then(|| PathBuf::from(value))
	}

	pub fn field_error(&self, field: &'static str, value: &str) -> GenError {
		GenError::RowFieldParse {
			sheet: self.sheet.name().to_string(),
			row: self.row,
			field,
			value: value.to_string(),
		}
	}
}

/// Parse an integer cell. Spreadsheet readers may render whole numbers with
/// a fractional part (`"10.0"`), which is accepted.
pub fn parse_integer(value: &str) -> Option<i64> {
	let value = value.trim();
	if let Ok(n) = value.parse::<i64>() {
		return Some(n);
	}

	let float = value.parse::<f64>().ok()?;
	(float.is_finite() && float.fract() == 0.0).then_some(float as i64)
}

/// Parse a boolean cell. Anything not recognised as true is false.
pub fn parse_flag(value: &str) -> bool {
	matches!(
		value.trim().to_ascii_lowercase().as_str(),
		"1" | "x" | "true" | "yes" | "y"
	)
}
