//! Incremental member merging for generated data blocks and types.
//!
//! A previously generated block keeps its header (attributes, version,
//! retain directive) verbatim and every member it already declares; newly
//! computed members are added or replace the type of an existing member.

use indexmap::IndexMap;

use crate::model::SupportDataBlock;

/// A struct member: name and everything between `:` and `;`.
pub type Member = (String, String);

/// Existing text of a block split into its verbatim header and parsed
/// members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStruct {
	pub header: Vec<String>,
	pub members: IndexMap<String, String>,
	/// Whether a `STRUCT` / `VAR RETAIN` line was found.
	pub has_section: bool,
}

/// Split an existing block at its first `STRUCT` / `VAR RETAIN` line. Lines
/// before it are the header; `name : type;` lines after it, up to `END_VAR`
/// or `END_STRUCT;`, are the members.
pub fn parse_struct(text: &str) -> ParsedStruct {
	let mut parsed = ParsedStruct::default();
	let mut lines = text.lines();

	for line in lines.by_ref() {
		if is_section_start(line) {
			parsed.has_section = true;
			break;
		}
		parsed.header.push(line.to_string());
	}

	for line in lines {
		let trimmed = line.trim();
		if trimmed.starts_with("END_VAR") || trimmed.starts_with("END_STRUCT") {
			break;
		}
		if let Some((name, type_clause)) = parse_member(trimmed) {
			parsed.members.insert(name, type_clause);
		}
	}

	parsed
}

fn is_section_start(line: &str) -> bool {
	let trimmed = line.trim();
	trimmed == "STRUCT" || trimmed.starts_with("VAR RETAIN") || trimmed.starts_with("STRUCT ")
}

/// Parse `name : type;`, ignoring trailing `//` comments. Returns `None` for
/// blank lines, comments and anything without a `:`.
pub fn parse_member(line: &str) -> Option<Member> {
	let code = line.split_once("//").map_or(line, |(code, _)| code).trim();
	if code.is_empty() {
		return None;
	}

	let code = code.strip_suffix(';').unwrap_or(code);
	let (name, type_clause) = code.split_once(':')?;
	let name = name.trim();
	let type_clause = type_clause.trim();
	if name.is_empty() || type_clause.is_empty() {
		return None;
	}

	Some((name.to_string(), type_clause.to_string()))
}

/// Merge `members` into the previously generated `existing` text of `block`
/// and render the result.
///
/// Existing members absent from `members` are kept; on a name collision the
/// new type clause wins. Without existing text a fresh header is rendered.
pub fn merge_struct(existing: Option<&str>, block: &SupportDataBlock, members: &[Member]) -> String {
	let mut parsed = existing.map(parse_struct).unwrap_or_default();
	if !parsed.has_section {
		if existing.is_some_and(|text| !text.trim().is_empty()) {
			tracing::warn!(block = %block.name, "existing source has no STRUCT section; regenerating header");
		}
		parsed = ParsedStruct {
			header: skeleton_header(block),
			members: IndexMap::new(),
			has_section: true,
		};
	}

	for (name, type_clause) in members {
		parsed.members.insert(name.clone(), type_clause.clone());
	}

	render(&parsed, block)
}

/// Header lines of a block that was never generated before.
pub fn skeleton_header(block: &SupportDataBlock) -> Vec<String> {
	if block.is_udt() {
		return vec![
			format!("TYPE \"{}\"", block.name),
			"VERSION : 0.1".to_string(),
		];
	}

	let optimized = if block.is_optimized { "TRUE" } else { "FALSE" };
	let mut header = vec![
		format!("DATA_BLOCK \"{}\"", block.name),
		format!("{{ S7_Optimized_Access := '{optimized}' }}"),
		"VERSION : 0.1".to_string(),
	];
	if !block.is_retain {
		header.push("NON_RETAIN".to_string());
	}

	header
}

fn render(parsed: &ParsedStruct, block: &SupportDataBlock) -> String {
	let mut lines = parsed.header.clone();
	let retain = block.is_retain && !block.is_udt();

	lines.push(if retain { "   VAR RETAIN" } else { "   STRUCT" }.to_string());
	for (name, type_clause) in &parsed.members {
		lines.push(format!("      {name} : {type_clause};"));
	}
	lines.push(if retain { "   END_VAR" } else { "   END_STRUCT;" }.to_string());
	lines.push(String::new());

	if block.is_udt() {
		lines.push("END_TYPE".to_string());
	} else {
		lines.push(String::new());
		lines.push("BEGIN".to_string());
		lines.push(String::new());
		lines.push("END_DATA_BLOCK".to_string());
	}

	let mut text = lines.join("\n");
	text.push('\n');
	text
}
