//! PLC tag tables exported as engineering-tool XML.
//!
//! Each table is one file holding a `SW.Tags.PlcTagTable` document. Tables
//! are rebuilt from the workbook on every run and merged over the previous
//! export, so hand-added tags survive while regenerated ones are refreshed.

use indexmap::IndexMap;
use quick_xml::Writer;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use serde::Deserialize;
use serde::Serialize;

use crate::GenError;
use crate::GenResult;
use crate::TOKEN_PREFIX;
use crate::applies;
use crate::model::EquipmentType;
use crate::model::InstanceBlock;
use crate::model::UserConstant;
use crate::substitute;

/// Table receiving tags whose table cell is empty.
pub const DEFAULT_TAG_TABLE: &str = "Default tag table";
/// Table receiving user constants.
pub const CONSTANT_TABLE: &str = "User constants";

/// A tag as written to the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlcTag {
	pub name: String,
	pub data_type: String,
	pub address: String,
	pub comment: String,
}

/// The tags of `instance`, each paired with the name of its table.
///
/// Only tags applying to the instance's variants are returned. The exported
/// name is the substituted link without its quotes, falling back to the
/// substituted tag name. Tags without an address are not exported.
pub fn instance_tags(equipment: &EquipmentType, instance: &InstanceBlock) -> Vec<(String, PlcTag)> {
	let context = &instance.context;
	let resolve = |text: &str| substitute(text, context, TOKEN_PREFIX);

	equipment
		.tags
		.values()
		.filter(|tag| applies(&tag.variants, &instance.variants))
		.filter_map(|tag| {
			let address = resolve(&tag.address);
			if address.is_empty() {
				tracing::debug!(instance = %instance.name, tag = %tag.name, "tag has no address; not exported");
				return None;
			}

			let link = resolve(&tag.link);
			let name = if link.is_empty() {
				resolve(&tag.name)
			} else {
				link.trim_matches('"').to_string()
			};
			let table = match resolve(&tag.table) {
				table if table.is_empty() => DEFAULT_TAG_TABLE.to_string(),
				table => table,
			};

			Some((
				table,
				PlcTag {
					name,
					data_type: tag.data_type.clone(),
					address,
					comment: resolve(&tag.comment),
				},
			))
		})
		.collect()
}

/// One tag table keyed by tag and constant name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagTable {
	pub name: String,
	pub tags: IndexMap<String, PlcTag>,
	pub constants: IndexMap<String, UserConstant>,
}

impl TagTable {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Add a tag unless one with the same name is already present.
	pub fn add_tag(&mut self, tag: PlcTag) -> bool {
		crate::model::insert_first(&mut self.tags, tag.name.clone(), tag)
	}

	/// Add a constant unless one with the same name is already present.
	pub fn add_constant(&mut self, constant: UserConstant) -> bool {
		crate::model::insert_first(&mut self.constants, constant.name.clone(), constant)
	}

	/// Overlay `newer` on this table. Entries of `newer` replace entries with
	/// the same name; entries only present here are kept.
	pub fn merge(&mut self, newer: Self) {
		for (name, tag) in newer.tags {
			self.tags.insert(name, tag);
		}
		for (name, constant) in newer.constants {
			self.constants.insert(name, constant);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.tags.is_empty() && self.constants.is_empty()
	}

	/// Read a previously exported table.
	pub fn parse(xml: &str) -> GenResult<Self> {
		let document: DocumentXml =
			quick_xml::de::from_str(xml).map_err(|e| GenError::Xml(e.to_string()))?;
		let table = document.table;
		let mut parsed = Self::new(table.attributes.name);

		for tag in table.objects.tags {
			parsed.add_tag(PlcTag {
				comment: tag.objects.comment_text(),
				name: tag.attributes.name,
				data_type: tag.attributes.data_type,
				address: tag.attributes.address,
			});
		}
		for constant in table.objects.constants {
			parsed.add_constant(UserConstant {
				comment: constant.objects.comment_text(),
				name: constant.attributes.name,
				data_type: constant.attributes.data_type,
				value: constant.attributes.value,
			});
		}

		Ok(parsed)
	}

	/// Render the table as an XML document. Comments are written for
	/// `culture`.
	pub fn to_xml(&self, culture: &str) -> GenResult<String> {
		let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
		let mut ids = 0_u32..;
		let mut next_id = || ids.next().unwrap_or_default().to_string();

		writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
		start(&mut writer, "Document", &[])?;
		let id = next_id();
		start(&mut writer, "SW.Tags.PlcTagTable", &[("ID", id.as_str())])?;
		start(&mut writer, "AttributeList", &[])?;
		text_element(&mut writer, "Name", &self.name)?;
		end(&mut writer, "AttributeList")?;
		start(&mut writer, "ObjectList", &[])?;

		for tag in self.tags.values() {
			let id = next_id();
			start(
				&mut writer,
				"SW.Tags.PlcTag",
				&[("ID", id.as_str()), ("CompositionName", "Tags")],
			)?;
			start(&mut writer, "AttributeList", &[])?;
			text_element(&mut writer, "DataTypeName", &tag.data_type)?;
			text_element(&mut writer, "LogicalAddress", &tag.address)?;
			text_element(&mut writer, "Name", &tag.name)?;
			end(&mut writer, "AttributeList")?;
			write_comment(&mut writer, &mut next_id, culture, &tag.comment)?;
			end(&mut writer, "SW.Tags.PlcTag")?;
		}

		for constant in self.constants.values() {
			let id = next_id();
			start(
				&mut writer,
				"SW.Tags.PlcUserConstant",
				&[("ID", id.as_str()), ("CompositionName", "UserConstants")],
			)?;
			start(&mut writer, "AttributeList", &[])?;
			text_element(&mut writer, "DataTypeName", &constant.data_type)?;
			text_element(&mut writer, "Name", &constant.name)?;
			text_element(&mut writer, "Value", &constant.value)?;
			end(&mut writer, "AttributeList")?;
			write_comment(&mut writer, &mut next_id, culture, &constant.comment)?;
			end(&mut writer, "SW.Tags.PlcUserConstant")?;
		}

		end(&mut writer, "ObjectList")?;
		end(&mut writer, "SW.Tags.PlcTagTable")?;
		end(&mut writer, "Document")?;

		let mut xml =
			String::from_utf8(writer.into_inner()).map_err(|e| GenError::Xml(e.to_string()))?;
		xml.push('\n');
		Ok(xml)
	}
}

type XmlWriter = Writer<Vec<u8>>;

fn start(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> GenResult<()> {
	let mut element = BytesStart::new(name);
	for attribute in attributes {
		element.push_attribute(*attribute);
	}
	writer.write_event(Event::Start(element))?;
	Ok(())
}

fn end(writer: &mut XmlWriter, name: &str) -> GenResult<()> {
	writer.write_event(Event::End(BytesEnd::new(name)))?;
	Ok(())
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> GenResult<()> {
	start(writer, name, &[])?;
	writer.write_event(Event::Text(BytesText::new(text)))?;
	end(writer, name)
}

fn write_comment(
	writer: &mut XmlWriter,
	next_id: &mut impl FnMut() -> String,
	culture: &str,
	comment: &str,
) -> GenResult<()> {
	if comment.is_empty() {
		return Ok(());
	}

	let text_id = next_id();
	let item_id = next_id();

	start(writer, "ObjectList", &[])?;
	start(
		writer,
		"MultilingualText",
		&[("ID", text_id.as_str()), ("CompositionName", "Comment")],
	)?;
	start(writer, "ObjectList", &[])?;
	start(
		writer,
		"MultilingualTextItem",
		&[("ID", item_id.as_str()), ("CompositionName", "Items")],
	)?;
	start(writer, "AttributeList", &[])?;
	text_element(writer, "Culture", culture)?;
	text_element(writer, "Text", comment)?;
	end(writer, "AttributeList")?;
	end(writer, "MultilingualTextItem")?;
	end(writer, "ObjectList")?;
	end(writer, "MultilingualText")?;
	end(writer, "ObjectList")
}

#[derive(Deserialize)]
struct DocumentXml {
	#[serde(rename = "SW.Tags.PlcTagTable")]
	table: TableXml,
}

#[derive(Deserialize)]
struct TableXml {
	#[serde(rename = "AttributeList")]
	attributes: TableAttributesXml,
	#[serde(rename = "ObjectList", default)]
	objects: TableObjectsXml,
}

#[derive(Deserialize)]
struct TableAttributesXml {
	#[serde(rename = "Name", default)]
	name: String,
}

#[derive(Default, Deserialize)]
struct TableObjectsXml {
	#[serde(rename = "SW.Tags.PlcTag", default)]
	tags: Vec<TagXml>,
	#[serde(rename = "SW.Tags.PlcUserConstant", default)]
	constants: Vec<ConstantXml>,
}

#[derive(Deserialize)]
struct TagXml {
	#[serde(rename = "AttributeList")]
	attributes: TagAttributesXml,
	#[serde(rename = "ObjectList", default)]
	objects: CommentObjectsXml,
}

#[derive(Deserialize)]
struct TagAttributesXml {
	#[serde(rename = "DataTypeName", default)]
	data_type: String,
	#[serde(rename = "LogicalAddress", default)]
	address: String,
	#[serde(rename = "Name", default)]
	name: String,
}

#[derive(Deserialize)]
struct ConstantXml {
	#[serde(rename = "AttributeList")]
	attributes: ConstantAttributesXml,
	#[serde(rename = "ObjectList", default)]
	objects: CommentObjectsXml,
}

#[derive(Deserialize)]
struct ConstantAttributesXml {
	#[serde(rename = "DataTypeName", default)]
	data_type: String,
	#[serde(rename = "Name", default)]
	name: String,
	#[serde(rename = "Value", default)]
	value: String,
}

#[derive(Default, Deserialize)]
struct CommentObjectsXml {
	#[serde(rename = "MultilingualText", default)]
	comment: Option<MultilingualTextXml>,
}

impl CommentObjectsXml {
	fn comment_text(self) -> String {
		self.comment
			.and_then(|text| text.objects.items.into_iter().next())
			.map(|item| item.attributes.text)
			.unwrap_or_default()
	}
}

#[derive(Deserialize)]
struct MultilingualTextXml {
	#[serde(rename = "ObjectList", default)]
	objects: MultilingualItemsXml,
}

#[derive(Default, Deserialize)]
struct MultilingualItemsXml {
	#[serde(rename = "MultilingualTextItem", default)]
	items: Vec<MultilingualTextItemXml>,
}

#[derive(Deserialize)]
struct MultilingualTextItemXml {
	#[serde(rename = "AttributeList")]
	attributes: MultilingualAttributesXml,
}

#[derive(Deserialize)]
struct MultilingualAttributesXml {
	#[serde(rename = "Text", default)]
	text: String,
}
