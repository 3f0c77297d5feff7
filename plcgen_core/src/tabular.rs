//! Read-only access to the workbook describing the equipment configuration.
//!
//! Cells are addressed 1-indexed by `(row, column)` and always read as text;
//! callers parse numbers, flags and lists locally.

use std::path::Path;

use calamine::Data;
use calamine::Reader;
use calamine::open_workbook_auto;

use crate::GenError;
use crate::GenResult;

/// Source of named sheets.
pub trait TabularSource {
	/// Find a sheet by name, ignoring ASCII case.
	fn sheet(&self, name: &str) -> Option<&Sheet>;

	/// Names of all sheets in workbook order.
	fn sheet_names(&self) -> Vec<&str>;
}

/// A grid of text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
	name: String,
	rows: Vec<Vec<String>>,
}

impl Sheet {
	pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
		Self {
			name: name.into(),
			rows,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Text of the cell at 1-indexed `(row, column)`. Cells outside the used
	/// range read as empty.
	pub fn cell(&self, row: usize, column: usize) -> &str {
		if row == 0 || column == 0 {
			return "";
		}

		self.rows
			.get(row - 1)
			.and_then(|cells| cells.get(column - 1))
			.map_or("", String::as_str)
	}

	/// 1-indexed number of the last row holding a non-empty cell, or `0` for
	/// an empty sheet.
	pub fn last_used_row(&self) -> usize {
		self.rows
			.iter()
			.rposition(|cells| cells.iter().any(|cell| !cell.trim().is_empty()))
			.map_or(0, |index| index + 1)
	}

	/// Number of cells stored for the 1-indexed `row`.
	pub fn row_width(&self, row: usize) -> usize {
		if row == 0 {
			return 0;
		}

		self.rows.get(row - 1).map_or(0, Vec::len)
	}

	/// Write a cell, growing the grid as needed.
	pub fn set(&mut self, row: usize, column: usize, value: impl Into<String>) -> &mut Self {
		assert!(row > 0 && column > 0, "cells are 1-indexed");

		if self.rows.len() < row {
			self.rows.resize_with(row, Vec::new);
		}
		let cells = &mut self.rows[row - 1];
		if cells.len() < column {
			cells.resize_with(column, String::new);
		}
		cells[column - 1] = value.into();

		self
	}

	/// Write consecutive cells of one row starting at `column`.
	pub fn set_row<S: Into<String>>(
		&mut self,
		row: usize,
		column: usize,
		values: impl IntoIterator<Item = S>,
	) -> &mut Self {
		for (index, value) in values.into_iter().enumerate() {
			self.set(row, column + index, value);
		}

		self
	}
}

/// An in-memory workbook.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
	sheets: Vec<Sheet>,
}

impl Workbook {
	pub fn new() -> Self {
		Self::default()
	}

	/// Open a workbook from disk. Directories are read as one `<sheet>.csv`
	/// file per sheet; anything else is opened as a spreadsheet file.
	pub fn open(path: &Path) -> GenResult<Self> {
		if path.is_dir() {
			Self::from_csv_dir(path)
		} else {
			Self::from_spreadsheet(path)
		}
	}

	/// Load every sheet of an `.xlsx`, `.xlsm`, `.xls` or `.ods` file.
	pub fn from_spreadsheet(path: &Path) -> GenResult<Self> {
		let open_error = |reason: String| {
			GenError::WorkbookOpen {
				path: path.display().to_string(),
				reason,
			}
		};

		let mut workbook = open_workbook_auto(path).map_err(|e| open_error(e.to_string()))?;
		let mut sheets = Vec::new();

		for name in workbook.sheet_names() {
			let range = workbook
				.worksheet_range(&name)
				.map_err(|e| open_error(e.to_string()))?;
			let (row_offset, column_offset) = range
				.start()
				.map_or((0, 0), |(row, column)| (row as usize, column as usize));

			let mut rows = vec![Vec::new(); row_offset];
			for range_row in range.rows() {
				let mut cells = vec![String::new(); column_offset];
				cells.extend(range_row.iter().map(cell_text));
				rows.push(cells);
			}

			sheets.push(Sheet::new(name, rows));
		}

		tracing::debug!(path = %path.display(), sheets = sheets.len(), "opened spreadsheet");
		Ok(Self { sheets })
	}

	/// Load a directory holding one CSV file per sheet. The file stem is the
	/// sheet name.
	pub fn from_csv_dir(path: &Path) -> GenResult<Self> {
		let mut files: Vec<_> = std::fs::read_dir(path)?
			.filter_map(Result::ok)
			.map(|entry| entry.path())
			.filter(|file| {
				file.extension()
					.and_then(|e| e.to_str())
					.is_some_and(|e| e.eq_ignore_ascii_case("csv"))
			})
			.collect();
		files.sort();

		let mut sheets = Vec::new();
		for file in files {
			let Some(name) = file.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};

			let mut reader = csv::ReaderBuilder::new()
				.has_headers(false)
				.flexible(true)
				.from_path(&file)
				.map_err(|e| {
					GenError::WorkbookOpen {
						path: file.display().to_string(),
						reason: e.to_string(),
					}
				})?;

			let mut rows = Vec::new();
			for record in reader.records() {
				let record = record.map_err(|e| {
					GenError::WorkbookOpen {
						path: file.display().to_string(),
						reason: e.to_string(),
					}
				})?;
				rows.push(record.iter().map(str::to_string).collect());
			}

			sheets.push(Sheet::new(name, rows));
		}

		tracing::debug!(path = %path.display(), sheets = sheets.len(), "opened csv workbook");
		Ok(Self { sheets })
	}

	/// Add a sheet, replacing any sheet with the same name.
	pub fn insert(&mut self, sheet: Sheet) -> &mut Self {
		self.sheets
			.retain(|existing| !existing.name.eq_ignore_ascii_case(&sheet.name));
		self.sheets.push(sheet);
		self
	}

	/// Mutable access to a sheet, created empty when missing.
	pub fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
		let index = match self
			.sheets
			.iter()
			.position(|sheet| sheet.name.eq_ignore_ascii_case(name))
		{
			Some(index) => index,
			None => {
				self.sheets.push(Sheet::new(name, Vec::new()));
				self.sheets.len() - 1
			}
		};

		&mut self.sheets[index]
	}
}

impl TabularSource for Workbook {
	fn sheet(&self, name: &str) -> Option<&Sheet> {
		self.sheets
			.iter()
			.find(|sheet| sheet.name.eq_ignore_ascii_case(name))
	}

	fn sheet_names(&self) -> Vec<&str> {
		self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
	}
}

fn cell_text(data: &Data) -> String {
	match data {
		Data::Empty => String::new(),
		Data::String(text) => text.clone(),
		Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
			format!("{}", *value as i64)
		}
		other => other.to_string(),
	}
}
