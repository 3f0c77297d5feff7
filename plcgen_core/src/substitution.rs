use std::collections::BTreeSet;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;

/// Prefix marking a substitution token inside template text, e.g. `@EqName`.
pub const TOKEN_PREFIX: &str = "@";

/// Ordered `(token, value)` pairs captured verbatim from a main-sheet row.
///
/// The order is significant: [`substitute`] applies the pairs one after the
/// other, so a token that appears inside an earlier value is replaced again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref)]
pub struct SubstitutionContext(Vec<(String, String)>);

impl SubstitutionContext {
	pub fn new(pairs: Vec<(String, String)>) -> Self {
		Self(pairs)
	}

	/// Look up the value captured for `token`.
	pub fn get(&self, token: &str) -> Option<&str> {
		self.0
			.iter()
			.find(|(name, _)| name == token)
			.map(|(_, value)| value.as_str())
	}
}

impl FromIterator<(String, String)> for SubstitutionContext {
	fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// A set of variant names restricting which instances an item applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref, DerefMut)]
pub struct VariantSet(BTreeSet<String>);

impl VariantSet {
	/// Parse a comma separated cell. An empty cell is the empty set, while an
	/// empty item inside a list (`"A,,B"`) is kept as the `""` sentinel.
	pub fn parse(cell: &str) -> Self {
		if cell.trim().is_empty() {
			return Self::default();
		}

		Self(cell.split(',').map(|item| item.trim().to_string()).collect())
	}
}

impl<S: Into<String>> FromIterator<S> for VariantSet {
	fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

/// Replace every `prefix + token` occurrence in `text` with the token's value.
///
/// Pairs are applied in context order and the result is trimmed after each
/// replacement that actually matched. Text without any token is returned
/// untouched, including its surrounding whitespace.
pub fn substitute(text: &str, context: &SubstitutionContext, prefix: &str) -> String {
	let mut result = text.to_string();

	for (token, value) in context.iter() {
		if token.is_empty() {
			continue;
		}

		let needle = format!("{prefix}{token}");
		if result.contains(&needle) {
			result = result.replace(&needle, value).trim().to_string();
		}
	}

	result
}

/// Whether an item restricted to `item` variants applies to an instance
/// configured with `instance` variants.
pub fn applies(item: &VariantSet, instance: &VariantSet) -> bool {
	item.is_empty() || item.contains("") || item.iter().any(|v| instance.contains(v))
}
