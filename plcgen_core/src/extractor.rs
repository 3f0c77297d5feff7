//! Builds the configuration [`Model`] from a workbook.
//!
//! The main sheet lists one equipment occurrence per row. Rows are filtered by
//! status, grouped by PLC and resolved against one sheet per equipment type.
//! Problems with a single row or table are logged and counted; only a missing
//! main sheet aborts extraction.

use serde::Serialize;

use crate::Cancellation;
use crate::GenError;
use crate::GenResult;
use crate::SubstitutionContext;
use crate::model::BlockCategory;
use crate::model::DbValue;
use crate::model::Declaration;
use crate::model::Direction;
use crate::model::EquipmentType;
use crate::model::ExtendedSupportBlock;
use crate::model::Function;
use crate::model::InstanceBlock;
use crate::model::LibraryReference;
use crate::model::Model;
use crate::model::Parameter;
use crate::model::Plc;
use crate::model::SectionKind;
use crate::model::SupportDataBlock;
use crate::model::Tag;
use crate::model::UserConstant;
use crate::model::insert_first;
use crate::numbering::instance_name;
use crate::schema::BlockKind;
use crate::schema::CoordinateBlock;
use crate::schema::EXTENDED_MARKER;
use crate::schema::MAIN_FIRST_ROW;
use crate::schema::MAIN_HEADER_ROW;
use crate::schema::RowReader;
use crate::schema::columns;
use crate::schema::parse_flag;
use crate::tabular::Sheet;
use crate::tabular::TabularSource;

/// Options controlling which rows are extracted.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
	/// Substring a row's status cell must contain. Empty matches every row.
	pub status: String,
	/// Maximum number of instances per PLC.
	pub max_instances: usize,
	pub main_sheet: String,
	pub config_sheet: String,
}

impl Default for ExtractOptions {
	fn default() -> Self {
		Self {
			status: String::new(),
			max_instances: crate::config::DEFAULT_MAX_INSTANCES,
			main_sheet: "Main".to_string(),
			config_sheet: "Config".to_string(),
		}
	}
}

impl ExtractOptions {
	pub fn from_config(config: &crate::PlcgenConfig) -> Self {
		Self {
			status: config.status.clone(),
			max_instances: config.max_instances,
			main_sheet: config.sheets.main.clone(),
			config_sheet: config.sheets.config.clone(),
		}
	}
}

/// Counters describing one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
	/// Main-sheet rows looked at.
	pub rows_scanned: usize,
	/// Rows whose status matched.
	pub rows_matched: usize,
	/// Instances added to the model.
	pub instances: usize,
	/// Matching rows skipped because of a missing sheet, a full PLC or a
	/// duplicate instance name.
	pub rows_skipped: usize,
	/// Rows dropped because a required field could not be parsed.
	pub row_failures: usize,
	/// Tables skipped because their anchor cells could not be parsed.
	pub block_failures: usize,
	/// Table records dropped because a field could not be parsed.
	pub record_failures: usize,
	/// Whether extraction stopped early on cancellation.
	pub cancelled: bool,
}

/// Extract the model from `source`.
pub fn extract_model(
	source: &dyn TabularSource,
	options: &ExtractOptions,
	cancel: &Cancellation,
) -> GenResult<(Model, ExtractReport)> {
	let main = source
		.sheet(&options.main_sheet)
		.ok_or_else(|| GenError::MissingSheet(options.main_sheet.clone()))?;
	let config = source.sheet(&options.config_sheet);
	if config.is_none() {
		tracing::warn!(
			sheet = %options.config_sheet,
			"config sheet not found; PLCs get no functions, shared blocks or constants"
		);
	}

	let mut extractor = Extractor {
		source,
		options,
		config,
		report: ExtractReport::default(),
	};
	let mut model = Model::default();

	for row in MAIN_FIRST_ROW..=main.last_used_row() {
		if cancel.is_cancelled() {
			tracing::info!(row, "extraction cancelled");
			extractor.report.cancelled = true;
			break;
		}

		extractor.extract_row(&mut model, main, row);
	}

	tracing::info!(
		plcs = model.plcs.len(),
		instances = extractor.report.instances,
		skipped = extractor.report.rows_skipped,
		failed = extractor.report.row_failures,
		"extracted model"
	);

	Ok((model, extractor.report))
}

struct Extractor<'a> {
	source: &'a dyn TabularSource,
	options: &'a ExtractOptions,
	config: Option<&'a Sheet>,
	report: ExtractReport,
}

impl Extractor<'_> {
	fn extract_row(&mut self, model: &mut Model, main: &Sheet, row: usize) {
		self.report.rows_scanned += 1;

		let status = main.cell(row, columns::main::STATUS);
		if !status.contains(self.options.status.as_str()) {
			return;
		}
		self.report.rows_matched += 1;

		let reader = RowReader::new(main, row, 1);
		let offset = |column: usize| column - 1;
		let (plc_name, type_eq, eq_name) = match (
			reader.required(offset(columns::main::PLC), "plc"),
			reader.required(offset(columns::main::TYPE_EQ), "typeEq"),
			reader.required(offset(columns::main::EQ_NAME), "eqName"),
		) {
			(Ok(plc), Ok(type_eq), Ok(eq_name)) => (plc, type_eq, eq_name),
			(Err(error), ..) | (_, Err(error), _) | (.., Err(error)) => {
				tracing::warn!(row, %error, "skipping row");
				self.report.row_failures += 1;
				return;
			}
		};

		if !model.plcs.contains_key(plc_name) {
			let plc = self.new_plc(plc_name);
			model.plcs.insert(plc_name.to_string(), plc);
		}
		let Some(plc) = model.plcs.get_mut(plc_name) else {
			return;
		};

		if plc.instances.len() >= self.options.max_instances {
			tracing::warn!(
				row,
				plc = plc_name,
				max = self.options.max_instances,
				"instance limit reached; skipping row"
			);
			self.report.rows_skipped += 1;
			return;
		}

		let source = self.source;
		let Some(type_sheet) = source.sheet(type_eq) else {
			tracing::warn!(row, type_eq, "no sheet for equipment type; skipping row");
			self.report.rows_skipped += 1;
			return;
		};

		if !plc.equipment_types.contains_key(type_eq) {
			let equipment = self.populate_equipment(type_eq, type_sheet);
			plc.equipment_types.insert(type_eq.to_string(), equipment);
		}
		let extended = plc.equipment_types[type_eq].is_extended;

		let order = match reader.number(offset(columns::main::NUMBER), "number") {
			Ok(order) => order,
			Err(error) => {
				tracing::warn!(row, %error, "invalid instance number; skipping row");
				self.report.row_failures += 1;
				return;
			}
		};

		let name = instance_name(type_eq, eq_name, extended);
		let instance = InstanceBlock {
			name: name.clone(),
			type_eq: type_eq.to_string(),
			eq_name: eq_name.to_string(),
			order,
			group: reader.text(offset(columns::main::GROUP)).to_string(),
			function: reader.text(offset(columns::main::FUNCTION)).to_string(),
			variants: reader.variants(offset(columns::main::VARIANTS)),
			context: capture_context(main, row),
		};

		if insert_first(&mut plc.instances, name.clone(), instance) {
			tracing::debug!(row, plc = plc_name, instance = %name, "added instance");
			self.report.instances += 1;
		} else {
			tracing::warn!(row, plc = plc_name, instance = %name, "duplicate instance; keeping the first");
			self.report.rows_skipped += 1;
		}
	}

	/// Create a PLC and fill its functions, shared blocks and constants from
	/// the config sheet rows addressed to it.
	fn new_plc(&mut self, name: &str) -> Plc {
		let mut plc = Plc::new(name);
		let Some(config) = self.config else {
			return plc;
		};

		for kind in BlockKind::CONFIG {
			let Some(block) = self.resolve(config, kind) else {
				continue;
			};

			for row in block.rows() {
				let reader = RowReader::new(config, row, block.column);
				if let Err(error) = read_config_row(&mut plc, kind, &reader) {
					tracing::warn!(sheet = config.name(), row, %kind, %error, "skipping record");
					self.report.record_failures += 1;
				}
			}
		}

		tracing::debug!(
			plc = name,
			functions = plc.functions.len(),
			support_blocks = plc.support_blocks.len(),
			constants = plc.user_constants.len(),
			"created plc"
		);
		plc
	}

	fn populate_equipment(&mut self, type_eq: &str, sheet: &Sheet) -> EquipmentType {
		let extended = parse_flag(sheet.cell(EXTENDED_MARKER.row, EXTENDED_MARKER.column));
		let mut equipment = EquipmentType::new(type_eq, extended);

		for kind in BlockKind::EQUIPMENT {
			if !kind.read_for(extended) {
				continue;
			}
			let Some(block) = self.resolve(sheet, kind) else {
				continue;
			};

			for row in block.rows() {
				let reader = RowReader::new(sheet, row, block.column);
				if let Err(error) = read_equipment_row(&mut equipment, kind, &reader) {
					tracing::warn!(sheet = sheet.name(), row, %kind, %error, "skipping record");
					self.report.record_failures += 1;
				}
			}
		}

		tracing::debug!(
			type_eq,
			extended,
			tags = equipment.tags.len(),
			parameters = equipment.parameters.len(),
			"populated equipment type"
		);
		equipment
	}

	fn resolve(&mut self, sheet: &Sheet, kind: BlockKind) -> Option<CoordinateBlock> {
		match CoordinateBlock::resolve(sheet, kind) {
			Ok(Some(block)) => Some(block),
			Ok(None) => {
				tracing::debug!(sheet = sheet.name(), %kind, "empty table");
				None
			}
			Err(error) => {
				let anchor = kind.anchor();
				if sheet.cell(anchor.row, anchor.column).trim().is_empty() {
					tracing::debug!(sheet = sheet.name(), %kind, "table not present");
				} else {
					tracing::warn!(sheet = sheet.name(), %kind, %error, "failed to parse table anchor");
					self.report.block_failures += 1;
				}
				None
			}
		}
	}
}

/// The `(header, value)` pairs of a main-sheet row, in column order.
fn capture_context(main: &Sheet, row: usize) -> SubstitutionContext {
	let width = main.row_width(MAIN_HEADER_ROW);
	(1..=width)
		.filter_map(|column| {
			let token = main.cell(MAIN_HEADER_ROW, column).trim();
			(!token.is_empty())
				.then(|| (token.to_string(), main.cell(row, column).trim().to_string()))
		})
		.collect()
}

/// Whether a config record with owner cell `owner` belongs to `plc`. An empty
/// owner addresses every PLC.
fn owned_by(owner: &str, plc: &Plc) -> bool {
	owner.is_empty() || owner.eq_ignore_ascii_case(&plc.name)
}

fn read_config_row(plc: &mut Plc, kind: BlockKind, reader: &RowReader<'_>) -> GenResult<()> {
	match kind {
		BlockKind::FunctionTemplate => {
			use columns::function_template as col;
			if !owned_by(reader.text(col::PLC), plc) {
				return Ok(());
			}
			let name = reader.required(col::NAME, "function")?;
			let function = Function {
				name: name.to_string(),
				group: reader.text(col::GROUP).to_string(),
				source: reader.path(col::SOURCE),
				sections: Vec::new(),
			};
			insert_first(&mut plc.functions, name, function);
		}
		BlockKind::SharedSupportDb => {
			if !owned_by(reader.text(0), plc) {
				return Ok(());
			}
			let block = read_support_db(&reader.shifted(1))?;
			insert_first(&mut plc.support_blocks, block.name.clone(), block);
		}
		BlockKind::UserConstant => {
			if !owned_by(reader.text(0), plc) {
				return Ok(());
			}
			let constant = read_constant(&reader.shifted(1))?;
			insert_first(&mut plc.user_constants, constant.name.clone(), constant);
		}
		BlockKind::ExtendedFcValue => {
			use columns::extended_fc_value as col;
			if !owned_by(reader.text(col::PLC), plc) {
				return Ok(());
			}
			let function = reader.required(col::FUNCTION, "function")?;
			let section = reader.required(col::SECTION, "section")?;
			let section_kind = SectionKind::parse(section)
				.ok_or_else(|| reader.field_error("section", section))?;
			let declaration = Declaration {
				name: reader.required(col::NAME, "name")?.to_string(),
				data_type: reader.required(col::TYPE, "type")?.to_string(),
				default: reader.text(col::DEFAULT).to_string(),
				comment: reader.text(col::COMMENT).to_string(),
			};
			plc.function_mut(function).declare(section_kind, declaration);
		}
		_ => {}
	}

	Ok(())
}

fn read_equipment_row(
	equipment: &mut EquipmentType,
	kind: BlockKind,
	reader: &RowReader<'_>,
) -> GenResult<()> {
	match kind {
		BlockKind::LibraryFb => {
			use columns::library_fb as col;
			let library = LibraryReference {
				name: reader.required(col::NAME, "name")?.to_string(),
				path: reader.text(col::PATH).to_string(),
			};
			insert_first(&mut equipment.libraries, library.name.clone(), library);
		}
		BlockKind::Tag => {
			use columns::tag as col;
			let tag = Tag {
				name: reader.required(col::NAME, "name")?.to_string(),
				link: reader.text(col::LINK).to_string(),
				data_type: reader.text(col::TYPE).to_string(),
				address: reader.text(col::ADDRESS).to_string(),
				table: reader.text(col::TABLE).to_string(),
				comment: reader.text(col::COMMENT).to_string(),
				variants: reader.variants(col::VARIANTS),
			};
			insert_first(&mut equipment.tags, tag.name.clone(), tag);
		}
		BlockKind::Parameter => {
			use columns::parameter as col;
			let direction = reader.text(col::DIRECTION);
			let parameter = Parameter {
				name: reader.required(col::NAME, "name")?.to_string(),
				direction: Direction::parse(direction)
					.ok_or_else(|| reader.field_error("direction", direction))?,
				value: reader.text(col::VALUE).to_string(),
				variants: reader.variants(col::VARIANTS),
			};
			insert_first(&mut equipment.parameters, parameter.name.clone(), parameter);
		}
		BlockKind::ExtendedSupport => {
			use columns::extended_support as col;
			let category = reader.text(col::CATEGORY);
			let support = ExtendedSupportBlock {
				name: reader.required(col::NAME, "name")?.to_string(),
				offset: reader.number(col::OFFSET, "offset")?,
				group: reader.text(col::GROUP).to_string(),
				category: BlockCategory::parse(category)
					.ok_or_else(|| reader.field_error("category", category))?,
				source: reader.path(col::SOURCE),
				variants: reader.variants(col::VARIANTS),
			};
			insert_first(&mut equipment.extended_supports, support.name.clone(), support);
		}
		BlockKind::Constant => {
			let constant = read_constant(reader)?;
			insert_first(&mut equipment.constants, constant.name.clone(), constant);
		}
		BlockKind::SupportDb => {
			let block = read_support_db(reader)?;
			insert_first(&mut equipment.support_blocks, block.name.clone(), block);
		}
		BlockKind::DbValue => {
			use columns::db_value as col;
			let value = DbValue {
				data_block: reader.required(col::DATA_BLOCK, "data block")?.to_string(),
				member: reader.required(col::MEMBER, "member")?.to_string(),
				type_clause: reader.required(col::TYPE, "type")?.to_string(),
				variants: reader.variants(col::VARIANTS),
			};
			let key = format!("{}.{}", value.data_block, value.member);
			insert_first(&mut equipment.db_values, key, value);
		}
		_ => {}
	}

	Ok(())
}

fn read_support_db(reader: &RowReader<'_>) -> GenResult<SupportDataBlock> {
	use columns::support_db as col;
	let category = reader.text(col::CATEGORY);

	Ok(SupportDataBlock {
		name: reader.required(col::NAME, "name")?.to_string(),
		number: reader.number(col::NUMBER, "number")?,
		group: reader.text(col::GROUP).to_string(),
		category: BlockCategory::parse(category)
			.ok_or_else(|| reader.field_error("category", category))?,
		source: reader.path(col::SOURCE),
		is_type: reader.flag(col::IS_TYPE),
		is_retain: reader.flag(col::IS_RETAIN),
		is_optimized: reader.flag(col::IS_OPTIMIZED),
	})
}

fn read_constant(reader: &RowReader<'_>) -> GenResult<UserConstant> {
	use columns::constant as col;

	Ok(UserConstant {
		name: reader.required(col::NAME, "name")?.to_string(),
		data_type: reader.required(col::TYPE, "type")?.to_string(),
		value: reader.text(col::VALUE).to_string(),
		comment: reader.text(col::COMMENT).to_string(),
	})
}
