//! Expands per-type templates into per-instance source fragments.

use crate::SubstitutionContext;
use crate::TOKEN_PREFIX;
use crate::VariantSet;
use crate::applies;
use crate::model::Direction;
use crate::model::EquipmentType;
use crate::model::ExtendedSupportBlock;
use crate::model::InstanceBlock;
use crate::model::SupportDataBlock;
use crate::model::UserConstant;
use crate::numbering::extended_support_number;
use crate::substitute;

/// Marker declaring the variants of a conditional region, placed on the line
/// following its `REGION` line.
pub const VARIANT_MARKER: &str = "isVariant - ";

/// Expand an extended type's template function for one instance.
///
/// The first `FUNCTION "<template_name>` line becomes the instance's function
/// header. Conditional regions whose variants do not apply to the instance
/// are dropped through their `END_REGION`; all other lines are substituted
/// with the instance context.
pub fn instantiate_template(template: &str, template_name: &str, instance: &InstanceBlock) -> String {
	let header = format!("FUNCTION \"{template_name}");
	let lines: Vec<&str> = template.lines().collect();
	let mut output = Vec::with_capacity(lines.len());
	let mut renamed = false;
	let mut index = 0;

	while index < lines.len() {
		let line = lines[index];

		if !renamed && line.trim_start().starts_with(&header) {
			output.push(format!("FUNCTION \"{}\" : Void", instance.name));
			renamed = true;
			index += 1;
			continue;
		}

		if is_region_start(line) {
			if let Some(declared) = lines.get(index + 1).and_then(|next| region_variants(next)) {
				if !applies(&declared, &instance.variants) {
					index = skip_region(&lines, index + 2);
					continue;
				}

				output.push(substitute_line(line, &instance.context));
				output.push(substitute_line(lines[index + 1], &instance.context));
				index += 2;
				continue;
			}
		}

		output.push(substitute_line(line, &instance.context));
		index += 1;
	}

	if !renamed {
		tracing::warn!(
			template = template_name,
			instance = %instance.name,
			"template has no matching FUNCTION header"
		);
	}

	join_lines(&output)
}

/// Substitute every line of `text` with `context`. Used for support block
/// sources that have no header to rename.
pub fn instantiate_lines(text: &str, context: &SubstitutionContext) -> String {
	let output: Vec<String> = text
		.lines()
		.map(|line| substitute_line(line, context))
		.collect();

	join_lines(&output)
}

fn substitute_line(line: &str, context: &SubstitutionContext) -> String {
	substitute(line, context, TOKEN_PREFIX)
}

fn is_region_start(line: &str) -> bool {
	line.trim_start().starts_with("REGION")
}

/// Variants declared by a conditional-region marker line.
pub fn region_variants(line: &str) -> Option<VariantSet> {
	let (_, declared) = line.split_once(VARIANT_MARKER)?;
	Some(VariantSet::parse(declared))
}

/// Index of the line after the `END_REGION` closing the region whose body
/// starts at `from`.
fn skip_region(lines: &[&str], from: usize) -> usize {
	lines[from.min(lines.len())..]
		.iter()
		.position(|line| line.contains("END_REGION"))
		.map_or(lines.len(), |offset| from + offset + 1)
}

fn join_lines(lines: &[String]) -> String {
	let mut text = lines.join("\n");
	text.push('\n');
	text
}

/// Region lines calling an extended instance's generated function from its
/// owning function.
pub fn template_call_region(instance: &InstanceBlock) -> Vec<String> {
	vec![
		format!("REGION Call template {}", instance.name),
		format!("    \"{}\"();", instance.name),
		"END_REGION".to_string(),
	]
}

/// Region lines calling a non-extended instance's function block, wiring the
/// applicable tags as named arguments and assigning the applicable
/// parameters.
pub fn fb_call_region(instance: &InstanceBlock, equipment: &EquipmentType) -> Vec<String> {
	let context = &instance.context;
	let arguments: Vec<String> = equipment
		.tags
		.values()
		.filter(|tag| applies(&tag.variants, &instance.variants))
		.filter(|tag| !tag.link.is_empty())
		.map(|tag| format!("{} := {}", tag.name, substitute_line(&tag.link, context)))
		.collect();

	let mut lines = vec![
		format!("REGION Call FB {}", instance.name),
		format!("    \"{}\"({});", instance.name, arguments.join(", ")),
	];

	for parameter in equipment
		.parameters
		.values()
		.filter(|parameter| applies(&parameter.variants, &instance.variants))
	{
		if parameter.value.is_empty() {
			continue;
		}

		let value = substitute_line(&parameter.value, context);
		let member = format!("\"{}\".{}", instance.name, parameter.name);
		if matches!(parameter.direction, Direction::Input | Direction::InOut) {
			lines.push(format!("    {member} := {value};"));
		}
		if matches!(parameter.direction, Direction::Output | Direction::InOut) {
			lines.push(format!("    {value} := {member};"));
		}
	}

	lines.push("END_REGION".to_string());
	lines
}

/// Source of the instance data block of a non-extended instance, typed by the
/// function block `fb_name`.
pub fn instance_db_source(instance: &InstanceBlock, fb_name: &str) -> String {
	let lines = vec![
		format!("DATA_BLOCK \"{}\"", instance.name),
		"{ S7_Optimized_Access := 'TRUE' }".to_string(),
		"VERSION : 0.1".to_string(),
		"NON_RETAIN".to_string(),
		format!("\"{fb_name}\""),
		String::new(),
		"BEGIN".to_string(),
		String::new(),
		"END_DATA_BLOCK".to_string(),
	];

	join_lines(&lines)
}

/// The support data block generated for `instance` from an extended support
/// template.
pub fn instantiate_support(template: &ExtendedSupportBlock, instance: &InstanceBlock) -> SupportDataBlock {
	SupportDataBlock {
		name: substitute_line(&template.name, &instance.context),
		number: extended_support_number(instance.db_number(), template.offset),
		group: if template.group.is_empty() {
			instance.group.clone()
		} else {
			substitute_line(&template.group, &instance.context)
		},
		category: template.category,
		source: template.source.clone(),
		is_type: false,
		is_retain: false,
		is_optimized: true,
	}
}

/// A type-level constant specialised for `instance`.
pub fn instantiate_constant(constant: &UserConstant, instance: &InstanceBlock) -> UserConstant {
	let context = &instance.context;
	UserConstant {
		name: substitute_line(&constant.name, context),
		data_type: constant.data_type.clone(),
		value: substitute_line(&constant.value, context),
		comment: substitute_line(&constant.comment, context),
	}
}
