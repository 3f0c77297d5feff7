use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

use crate::SubstitutionContext;
use crate::VariantSet;
use crate::numbering::instance_db_number;

/// The configuration graph extracted from a workbook, keyed by PLC name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Model {
	pub plcs: IndexMap<String, Plc>,
}

impl Model {
	/// Total number of instances across all PLCs.
	pub fn instance_count(&self) -> usize {
		self.plcs.values().map(|plc| plc.instances.len()).sum()
	}
}

/// A controller and everything generated for it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plc {
	pub name: String,
	pub equipment_types: IndexMap<String, EquipmentType>,
	pub instances: IndexMap<String, InstanceBlock>,
	pub functions: IndexMap<String, Function>,
	pub support_blocks: IndexMap<String, SupportDataBlock>,
	pub user_constants: IndexMap<String, UserConstant>,
}

impl Plc {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// The function called `name`, created with an empty declaration list when
	/// the workbook never defined it.
	pub fn function_mut(&mut self, name: &str) -> &mut Function {
		self.functions
			.entry(name.to_string())
			.or_insert_with(|| Function::new(name))
	}
}

/// Insert `value` unless `key` is already present. The first occurrence of a
/// natural key wins; later duplicates are dropped. Returns whether the value
/// was inserted.
pub fn insert_first<V>(map: &mut IndexMap<String, V>, key: impl Into<String>, value: V) -> bool {
	match map.entry(key.into()) {
		Entry::Occupied(entry) => {
			tracing::debug!(key = %entry.key(), "ignoring duplicate key");
			false
		}
		Entry::Vacant(entry) => {
			entry.insert(value);
			true
		}
	}
}

/// A category of equipment sharing one definition sheet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EquipmentType {
	pub type_eq: String,
	/// Instances of extended types are generated from a template function
	/// instead of calling one shared function block.
	pub is_extended: bool,
	pub libraries: IndexMap<String, LibraryReference>,
	pub tags: IndexMap<String, Tag>,
	pub parameters: IndexMap<String, Parameter>,
	pub extended_supports: IndexMap<String, ExtendedSupportBlock>,
	pub constants: IndexMap<String, UserConstant>,
	pub support_blocks: IndexMap<String, SupportDataBlock>,
	pub db_values: IndexMap<String, DbValue>,
}

impl EquipmentType {
	pub fn new(type_eq: impl Into<String>, is_extended: bool) -> Self {
		Self {
			type_eq: type_eq.into(),
			is_extended,
			..Self::default()
		}
	}
}

/// One configured equipment occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceBlock {
	pub name: String,
	pub type_eq: String,
	pub eq_name: String,
	/// Ordering position; `0` requests automatic numbering.
	pub order: u32,
	pub group: String,
	/// Name of the function that calls this instance.
	pub function: String,
	pub variants: VariantSet,
	pub context: SubstitutionContext,
}

impl InstanceBlock {
	pub fn db_number(&self) -> u32 {
		instance_db_number(self.order)
	}
}

/// Reference to the library function block backing a non-extended type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryReference {
	pub name: String,
	pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
	pub name: String,
	/// Link expression before substitution, e.g. `"@EqName_Run"`.
	pub link: String,
	pub data_type: String,
	pub address: String,
	pub table: String,
	pub comment: String,
	pub variants: VariantSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
	Input,
	Output,
	InOut,
}

impl Direction {
	pub fn parse(cell: &str) -> Option<Self> {
		match cell.trim().to_ascii_uppercase().as_str() {
			"I" | "IN" | "INPUT" => Some(Self::Input),
			"O" | "OUT" | "OUTPUT" => Some(Self::Output),
			"IO" | "INOUT" | "IN_OUT" => Some(Self::InOut),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
	pub name: String,
	pub direction: Direction,
	pub value: String,
	pub variants: VariantSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BlockCategory {
	#[default]
	Db,
	Udt,
}

impl BlockCategory {
	pub fn parse(cell: &str) -> Option<Self> {
		match cell.trim().to_ascii_uppercase().as_str() {
			"" | "DB" => Some(Self::Db),
			"UDT" => Some(Self::Udt),
			_ => None,
		}
	}
}

/// A data block (or type) generated next to the program blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportDataBlock {
	pub name: String,
	pub number: u32,
	pub group: String,
	pub category: BlockCategory,
	pub source: Option<PathBuf>,
	pub is_type: bool,
	pub is_retain: bool,
	pub is_optimized: bool,
}

impl SupportDataBlock {
	/// Whether the block is emitted with `TYPE ... END_TYPE` layout.
	pub fn is_udt(&self) -> bool {
		self.is_type || self.category == BlockCategory::Udt
	}
}

/// Template of a support data block generated once per extended instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedSupportBlock {
	/// Name pattern, substituted with the instance context.
	pub name: String,
	pub offset: u32,
	pub group: String,
	pub category: BlockCategory,
	pub source: Option<PathBuf>,
	pub variants: VariantSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserConstant {
	pub name: String,
	pub data_type: String,
	pub value: String,
	pub comment: String,
}

/// A struct member contributed to a support data block by each instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbValue {
	pub data_block: String,
	/// Member name pattern, substituted with the instance context.
	pub member: String,
	pub type_clause: String,
	pub variants: VariantSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SectionKind {
	Input,
	Output,
	InOut,
	Temp,
	Constant,
}

impl SectionKind {
	pub fn parse(cell: &str) -> Option<Self> {
		match cell.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
			"input" | "in" | "i" => Some(Self::Input),
			"output" | "out" | "o" => Some(Self::Output),
			"inout" | "io" => Some(Self::InOut),
			"temp" | "t" => Some(Self::Temp),
			"constant" | "const" | "c" => Some(Self::Constant),
			_ => None,
		}
	}

	pub fn keyword(self) -> &'static str {
		match self {
			Self::Input => "VAR_INPUT",
			Self::Output => "VAR_OUTPUT",
			Self::InOut => "VAR_IN_OUT",
			Self::Temp => "VAR_TEMP",
			Self::Constant => "VAR CONSTANT",
		}
	}
}

impl fmt::Display for SectionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.keyword())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
	pub name: String,
	pub data_type: String,
	pub default: String,
	pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationSection {
	pub kind: SectionKind,
	pub declarations: Vec<Declaration>,
}

/// A function that calls the generated instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
	pub name: String,
	pub group: String,
	/// Hand-authored source used when the function file is first created.
	pub source: Option<PathBuf>,
	pub sections: Vec<DeclarationSection>,
}

impl Function {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			group: String::new(),
			source: None,
			sections: Vec::new(),
		}
	}

	/// Add a declaration to its section. A name already declared in the same
	/// section is ignored.
	pub fn declare(&mut self, kind: SectionKind, declaration: Declaration) -> bool {
		let section = match self.sections.iter().position(|s| s.kind == kind) {
			Some(index) => &mut self.sections[index],
			None => {
				self.sections.push(DeclarationSection {
					kind,
					declarations: Vec::new(),
				});
				let last = self.sections.len() - 1;
				&mut self.sections[last]
			}
		};

		if section
			.declarations
			.iter()
			.any(|d| d.name == declaration.name)
		{
			return false;
		}

		section.declarations.push(declaration);
		true
	}

	/// Render the initial source of this function: header, declaration
	/// sections in canonical order, and an empty body.
	pub fn render_skeleton(&self) -> String {
		let mut sections: Vec<&DeclarationSection> = self.sections.iter().collect();
		sections.sort_by_key(|s| s.kind);

		let mut lines = vec![
			format!("FUNCTION \"{}\" : Void", self.name),
			"{ S7_Optimized_Access := 'TRUE' }".to_string(),
			"VERSION : 0.1".to_string(),
		];

		for section in sections {
			lines.push(format!("   {}", section.kind.keyword()));
			for declaration in &section.declarations {
				let mut line = format!("      {} : {}", declaration.name, declaration.data_type);
				if !declaration.default.is_empty() {
					line.push_str(" := ");
					line.push_str(&declaration.default);
				}
				line.push(';');
				if !declaration.comment.is_empty() {
					line.push_str("   // ");
					line.push_str(&declaration.comment);
				}
				lines.push(line);
			}
			lines.push("   END_VAR".to_string());
			lines.push(String::new());
		}

		lines.push(String::new());
		lines.push("BEGIN".to_string());
		lines.push("END_FUNCTION".to_string());

		let mut text = lines.join("\n");
		text.push('\n');
		text
	}
}
