use std::path::Path;

use crate::SubstitutionContext;
use crate::VariantSet;
use crate::model::InstanceBlock;
use crate::schema::BlockKind;
use crate::schema::MAIN_HEADER_ROW;
use crate::tabular::Sheet;
use crate::tabular::Workbook;

pub(crate) const MAIN_HEADERS: [&str; 9] = [
	"PLC", "Status", "TypeEq", "EqName", "Number", "Group", "Function", "Variants", "Area",
];

/// Write the anchor cells of `kind` and its record rows, starting with the
/// title row at `start_row`.
pub(crate) fn table(sheet: &mut Sheet, kind: BlockKind, start_row: usize, records: &[&[&str]]) {
	let anchor = kind.anchor();
	sheet.set(anchor.row, anchor.column, start_row.to_string());
	sheet.set(anchor.row, anchor.column + 1, records.len().to_string());
	sheet.set(start_row, anchor.column, kind.label());

	for (index, record) in records.iter().enumerate() {
		sheet.set_row(start_row + 2 + index, anchor.column, record.iter().copied());
	}
}

pub(crate) fn main_sheet(rows: &[[&str; 9]]) -> Sheet {
	let mut sheet = Sheet::new("Main", Vec::new());
	sheet.set(1, 1, "Equipment");
	sheet.set_row(MAIN_HEADER_ROW, 1, MAIN_HEADERS);
	for (index, row) in rows.iter().enumerate() {
		sheet.set_row(MAIN_HEADER_ROW + 1 + index, 1, row.iter().copied());
	}

	sheet
}

pub(crate) fn config_sheet() -> Sheet {
	let mut sheet = Sheet::new("Config", Vec::new());
	table(
		&mut sheet,
		BlockKind::FunctionTemplate,
		3,
		&[&["PLC1", "FC_Pumps", "Calls", ""], &["", "FC_Valves", "Calls", ""]],
	);
	table(
		&mut sheet,
		BlockKind::SharedSupportDb,
		3,
		&[&["PLC1", "DB_Shared", "300", "Data", "DB", "", "", "1", "1"]],
	);
	table(
		&mut sheet,
		BlockKind::UserConstant,
		3,
		&[&["", "MAX_PUMPS", "Int", "10", "Pump count"]],
	);
	table(
		&mut sheet,
		BlockKind::ExtendedFcValue,
		3,
		&[&["PLC1", "FC_Pumps", "Temp", "busy", "Bool", "", "any pump running"]],
	);

	sheet
}

/// A non-extended type calling the `FB_Pump` library block.
pub(crate) fn pump_sheet() -> Sheet {
	let mut sheet = Sheet::new("Pump", Vec::new());
	sheet.set(1, 1, "Pump");
	table(&mut sheet, BlockKind::LibraryFb, 3, &[&["FB_Pump", "Library/Pumps"]]);
	table(
		&mut sheet,
		BlockKind::Tag,
		3,
		&[
			&["Run", "\"@EqName_Run\"", "Bool", "%I@Number.0", "Pumps", "Run feedback of @EqName", ""],
			&["Speed", "\"@EqName_Speed\"", "Int", "", "Pumps", "", ""],
			&["Boost", "\"@EqName_Boost\"", "Bool", "%Q@Number.1", "", "", "B"],
		],
	);
	table(
		&mut sheet,
		BlockKind::Parameter,
		3,
		&[&["Enable", "I", "TRUE", ""], &["Fault", "O", "\"@EqName_Fault\"", "B"]],
	);
	table(
		&mut sheet,
		BlockKind::Constant,
		3,
		&[&["@EqName_MAX", "Int", "100", "limit of @EqName"]],
	);
	table(
		&mut sheet,
		BlockKind::SupportDb,
		3,
		&[&["DB_Pumps", "400", "Data", "DB", "", "", "", "1"]],
	);
	table(&mut sheet, BlockKind::DbValue, 3, &[&["DB_Pumps", "@EqName", "Bool", ""]]);

	sheet
}

/// An extended type generated from the `Valve.scl` template.
pub(crate) fn valve_sheet() -> Sheet {
	let mut sheet = Sheet::new("Valve", Vec::new());
	sheet.set(1, 1, "Valve");
	sheet.set(1, 2, "x");
	table(
		&mut sheet,
		BlockKind::Tag,
		3,
		&[&["Open", "\"@EqName_Open\"", "Bool", "%Q0.@Number", "Valves", "", ""]],
	);
	table(
		&mut sheet,
		BlockKind::ExtendedSupport,
		3,
		&[&["DB_@EqName", "1", "Valves", "DB", "", ""]],
	);
	table(&mut sheet, BlockKind::DbValue, 3, &[&["DB_@EqName", "state", "Int", ""]]);

	sheet
}

pub(crate) fn sample_rows() -> Vec<[&'static str; 9]> {
	vec![
		["PLC1", "Released", "Pump", "P1", "5", "Pumps", "FC_Pumps", "A", "North"],
		["PLC1", "Released", "Pump", "P10", "6", "Pumps", "FC_Pumps", "B", "North"],
		["PLC1", "Draft", "Pump", "P2", "7", "Pumps", "FC_Pumps", "", "South"],
		["PLC1", "Released", "Valve", "V1", "3", "Valves", "FC_Valves", "Fast", "South"],
		["PLC1", "Released", "Pump", "P1", "8", "Pumps", "FC_Pumps", "", "East"],
	]
}

pub(crate) fn sample_workbook() -> Workbook {
	let mut workbook = Workbook::new();
	workbook
		.insert(main_sheet(&sample_rows()))
		.insert(config_sheet())
		.insert(pump_sheet())
		.insert(valve_sheet());

	workbook
}

pub(crate) const VALVE_TEMPLATE: &str = r#"FUNCTION "Valve" : Void
{ S7_Optimized_Access := 'TRUE' }
VERSION : 0.1

BEGIN
    "@EqName_Open" := TRUE;
    REGION Fast path
    // isVariant - Fast
        "@EqName_Fast" := TRUE;
    END_REGION
    REGION Slow path
    // isVariant - Slow
        "@EqName_Slow" := TRUE;
    END_REGION
END_FUNCTION
"#;

pub(crate) fn write_templates(dir: &Path) {
	std::fs::create_dir_all(dir).unwrap_or_else(|e| panic!("create templates: {e}"));
	std::fs::write(dir.join("Valve.scl"), VALVE_TEMPLATE)
		.unwrap_or_else(|e| panic!("write template: {e}"));
}

pub(crate) fn context(pairs: &[(&str, &str)]) -> SubstitutionContext {
	pairs
		.iter()
		.map(|(token, value)| ((*token).to_string(), (*value).to_string()))
		.collect()
}

pub(crate) fn variants(items: &[&str]) -> VariantSet {
	items.iter().copied().collect()
}

pub(crate) fn pump_instance(eq_name: &str, order: u32, instance_variants: &[&str]) -> InstanceBlock {
	let number = order.to_string();
	InstanceBlock {
		name: format!("iDB-Pump|{eq_name}"),
		type_eq: "Pump".to_string(),
		eq_name: eq_name.to_string(),
		order,
		group: "Pumps".to_string(),
		function: "FC_Pumps".to_string(),
		variants: variants(instance_variants),
		context: context(&[("EqName", eq_name), ("Number", number.as_str())]),
	}
}
