//! Deterministic names and block numbers derived from configuration order.
//!
//! Every ordering position reserves a range of [`NUMBER_STRIDE`] block
//! numbers starting at [`NUMBER_BASE`], so instance data blocks and the
//! support blocks generated next to them never collide.

/// First block number handed out to ordering position 1.
pub const NUMBER_BASE: u32 = 1000;
/// Block numbers reserved per ordering position.
pub const NUMBER_STRIDE: u32 = 20;

/// Block number for the instance at ordering position `order`. Position `0`
/// requests automatic numbering from the backend and yields `0`.
pub fn instance_db_number(order: u32) -> u32 {
	if order == 0 {
		return 0;
	}

	(order - 1) * NUMBER_STRIDE + NUMBER_BASE
}

/// Block number of an extended support block placed `offset` slots after its
/// instance's base number. An automatic base stays automatic.
pub fn extended_support_number(base: u32, offset: u32) -> u32 {
	if base == 0 { 0 } else { base + offset }
}

/// Name of the block generated for one equipment occurrence.
pub fn instance_name(type_eq: &str, eq_name: &str, extended: bool) -> String {
	if extended {
		format!("FC_{eq_name}")
	} else {
		format!("iDB-{type_eq}|{eq_name}")
	}
}

/// Name of the shared source collecting the functions of every instance of
/// an extended equipment type.
pub fn aggregator_name(type_eq: &str) -> String {
	format!("FC_Call-{type_eq}")
}

/// Make a block name usable as a file name.
pub fn file_stem(name: &str) -> String {
	name.chars()
		.map(|c| {
			match c {
				'<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
				c if c.is_control() => '_',
				c => c,
			}
		})
		.collect::<String>()
		.trim()
		.to_string()
}
