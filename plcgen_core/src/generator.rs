//! Turns an extracted [`Model`] into source files and import requests.
//!
//! Generation runs in two phases. [`plan`] computes every file edit inside a
//! [`Workspace`] without touching disk; [`apply`] commits the workspace and
//! then hands the written sources to the [`EngineeringBackend`]. A dry run is
//! simply a plan whose workspace is never committed.

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::Cancellation;
use crate::GenError;
use crate::GenResult;
use crate::PlcgenConfig;
use crate::TOKEN_PREFIX;
use crate::applies;
use crate::backend::EngineeringBackend;
use crate::backend::ImportRequest;
use crate::backend::SourceKind;
use crate::instancer::fb_call_region;
use crate::instancer::instance_db_source;
use crate::instancer::instantiate_constant;
use crate::instancer::instantiate_lines;
use crate::instancer::instantiate_support;
use crate::instancer::instantiate_template;
use crate::instancer::template_call_region;
use crate::model::EquipmentType;
use crate::model::Function;
use crate::model::InstanceBlock;
use crate::model::Model;
use crate::model::Plc;
use crate::model::SupportDataBlock;
use crate::model::insert_first;
use crate::numbering::aggregator_name;
use crate::numbering::file_stem;
use crate::patcher::read_optional;
use crate::patcher::upsert_function_block;
use crate::patcher::upsert_region;
use crate::struct_merge::Member;
use crate::struct_merge::merge_struct;
use crate::substitute;
use crate::tag_table::CONSTANT_TABLE;
use crate::tag_table::TagTable;
use crate::tag_table::instance_tags;
use crate::workspace::Workspace;

/// Where generated files go and where templates come from.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
	pub output: PathBuf,
	pub templates: PathBuf,
	/// Culture of exported tag comments.
	pub culture: String,
}

impl GenerateOptions {
	/// Options from a config whose paths were already resolved.
	pub fn from_config(config: &PlcgenConfig) -> Self {
		Self {
			output: config.output.clone(),
			templates: config.templates.clone(),
			culture: config.tags.culture.clone(),
		}
	}
}

/// An item that could not be generated or imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
	pub plc: String,
	pub item: String,
	pub reason: String,
}

/// Counters describing one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
	pub instances_generated: usize,
	pub instances_failed: usize,
	/// Support data blocks and types rendered.
	pub support_blocks: usize,
	pub tag_tables: usize,
	/// Files written by [`apply`].
	pub files_written: usize,
	/// Import requests accepted by the backend.
	pub imports: usize,
	pub failures: Vec<Failure>,
	pub cancelled: bool,
}

impl GenerationReport {
	pub fn has_failures(&self) -> bool {
		!self.failures.is_empty()
	}
}

/// Planned edits awaiting [`apply`].
#[derive(Debug, Clone, Default)]
pub struct GenerationPlan {
	pub report: GenerationReport,
	/// Import requests per PLC, one per generated file.
	pub imports: IndexMap<String, Vec<ImportRequest>>,
}

/// Plan, commit and import in one go. A cancelled plan writes nothing.
pub fn generate(
	model: &Model,
	options: &GenerateOptions,
	workspace: &mut Workspace,
	backend: &mut dyn EngineeringBackend,
	cancel: &Cancellation,
) -> GenResult<GenerationReport> {
	let plan = plan(model, options, workspace, cancel)?;
	if plan.report.cancelled {
		tracing::info!("generation cancelled; nothing written");
		return Ok(plan.report);
	}

	apply(plan, workspace, backend)
}

/// Compute every generated file inside `workspace`.
pub fn plan(
	model: &Model,
	options: &GenerateOptions,
	workspace: &mut Workspace,
	cancel: &Cancellation,
) -> GenResult<GenerationPlan> {
	let mut generator = Generator {
		options,
		workspace,
		plan: GenerationPlan::default(),
	};

	for plc in model.plcs.values() {
		if cancel.is_cancelled() {
			generator.plan.report.cancelled = true;
			break;
		}

		generator.generate_plc(plc, cancel);
		if generator.plan.report.cancelled {
			break;
		}
	}

	let report = &generator.plan.report;
	tracing::info!(
		generated = report.instances_generated,
		failed = report.instances_failed,
		support_blocks = report.support_blocks,
		tag_tables = report.tag_tables,
		"planned generation"
	);

	Ok(generator.plan)
}

/// Write the planned files, then import them through `backend` and compile
/// every PLC. Backend failures are recorded per item; the remaining items
/// are still imported.
pub fn apply(
	plan: GenerationPlan,
	workspace: &mut Workspace,
	backend: &mut dyn EngineeringBackend,
) -> GenResult<GenerationReport> {
	let GenerationPlan {
		mut report,
		imports,
	} = plan;
	report.files_written = workspace.commit()?;

	for (plc, requests) in &imports {
		let mut record = |item: &str, error: &GenError| {
			tracing::warn!(plc = %plc, item, %error, "backend request failed");
			report.failures.push(Failure {
				plc: plc.clone(),
				item: item.to_string(),
				reason: error.to_string(),
			});
		};

		let mut groups: Vec<&str> = Vec::new();
		for request in requests {
			if !request.group.is_empty() && !groups.contains(&request.group.as_str()) {
				groups.push(&request.group);
			}
		}
		for group in groups {
			if let Err(error) = backend.ensure_group(plc, group) {
				record(group, &error);
			}
		}

		let mut imported = 0;
		for request in requests {
			match backend.import_source(request) {
				Ok(()) => imported += 1,
				Err(error) => record(&request.name, &error),
			}
		}

		if let Err(error) = backend.compile_and_save(plc) {
			record(plc, &error);
		}

		report.imports += imported;
	}

	tracing::info!(
		files = report.files_written,
		imports = report.imports,
		failures = report.failures.len(),
		"applied generation"
	);

	Ok(report)
}

/// Output directory of a block group. Nested groups use `/` as separator.
pub fn group_dir(group: &str) -> PathBuf {
	group
		.split(['/', '\\'])
		.map(str::trim)
		.filter(|segment| !segment.is_empty())
		.map(file_stem)
		.collect()
}

/// Collected while walking one PLC's instances and rendered afterwards.
#[derive(Default)]
struct PlcOutputs {
	blocks: IndexMap<String, SupportDataBlock>,
	members: IndexMap<String, Vec<Member>>,
	tables: IndexMap<String, TagTable>,
	imports: IndexMap<PathBuf, ImportRequest>,
}

impl PlcOutputs {
	fn import(&mut self, request: ImportRequest) {
		self.imports.insert(request.path.clone(), request);
	}
}

/// Edits of one instance, applied only after every step of the instance
/// succeeded.
#[derive(Default)]
struct InstanceOutputs {
	files: Vec<(PathBuf, String)>,
	imports: Vec<ImportRequest>,
	/// Extended support blocks without a source, merged like shared blocks.
	blocks: Vec<SupportDataBlock>,
	support_blocks: usize,
}

struct Generator<'a> {
	options: &'a GenerateOptions,
	workspace: &'a mut Workspace,
	plan: GenerationPlan,
}

impl Generator<'_> {
	fn generate_plc(&mut self, plc: &Plc, cancel: &Cancellation) {
		let root = self.options.output.join(file_stem(&plc.name));
		let mut outputs = PlcOutputs::default();

		for block in plc.support_blocks.values() {
			insert_first(&mut outputs.blocks, block.name.clone(), block.clone());
		}

		for instance in plc.instances.values() {
			if cancel.is_cancelled() {
				tracing::info!(plc = %plc.name, instance = %instance.name, "generation cancelled");
				self.plan.report.cancelled = true;
				return;
			}

			match self.generate_instance(plc, instance, &root, &mut outputs) {
				Ok(()) => self.plan.report.instances_generated += 1,
				Err(error) => {
					tracing::warn!(plc = %plc.name, instance = %instance.name, %error, "instance failed");
					self.plan.report.instances_failed += 1;
					self.fail(&plc.name, &instance.name, &error);
				}
			}
		}

		for constant in plc.user_constants.values() {
			outputs
				.tables
				.entry(CONSTANT_TABLE.to_string())
				.or_insert_with(|| TagTable::new(CONSTANT_TABLE))
				.add_constant(constant.clone());
		}

		self.render_blocks(plc, &root, &mut outputs);
		self.render_tag_tables(plc, &root, &mut outputs);

		self.plan
			.imports
			.insert(plc.name.clone(), outputs.imports.into_values().collect());
	}

	fn fail(&mut self, plc: &str, item: &str, error: &GenError) {
		self.plan.report.failures.push(Failure {
			plc: plc.to_string(),
			item: item.to_string(),
			reason: error.to_string(),
		});
	}

	fn generate_instance(
		&mut self,
		plc: &Plc,
		instance: &InstanceBlock,
		root: &Path,
		outputs: &mut PlcOutputs,
	) -> GenResult<()> {
		let equipment = plc.equipment_types.get(&instance.type_eq).ok_or_else(|| {
			GenError::MissingSheet(instance.type_eq.clone())
		})?;

		let mut staged = InstanceOutputs::default();
		let call_region = if equipment.is_extended {
			self.generate_extended(plc, equipment, instance, root, &mut staged)?;
			template_call_region(instance)
		} else {
			generate_instance_db(plc, equipment, instance, root, &mut staged);
			fb_call_region(instance, equipment)
		};
		self.patch_owning_function(plc, instance, &call_region, root, &mut staged)?;

		for (path, content) in staged.files {
			self.workspace.write(&path, content);
		}
		for request in staged.imports {
			outputs.import(request);
		}
		for block in staged.blocks {
			insert_first(&mut outputs.blocks, block.name.clone(), block);
		}
		self.plan.report.support_blocks += staged.support_blocks;
		collect_instance_data(equipment, instance, outputs);

		Ok(())
	}

	fn generate_extended(
		&mut self,
		plc: &Plc,
		equipment: &EquipmentType,
		instance: &InstanceBlock,
		root: &Path,
		staged: &mut InstanceOutputs,
	) -> GenResult<()> {
		let template_path = self
			.options
			.templates
			.join(format!("{}.scl", file_stem(&equipment.type_eq)));
		let template = read_template(&template_path, &equipment.type_eq)?;
		let function = instantiate_template(&template, &equipment.type_eq, instance);

		let name = aggregator_name(&equipment.type_eq);
		let path = root
			.join("sources")
			.join(group_dir(&instance.group))
			.join(format!("{}.scl", file_stem(&name)));
		let existing = self.workspace.read(&path)?.unwrap_or_default();
		staged.files.push((
			path.clone(),
			upsert_function_block(&existing, &instance.name, &function),
		));
		staged.imports.push(ImportRequest {
			plc: plc.name.clone(),
			name,
			path,
			number: 0,
			group: instance.group.clone(),
			kind: SourceKind::Function,
		});

		for support in equipment
			.extended_supports
			.values()
			.filter(|support| applies(&support.variants, &instance.variants))
		{
			let block = instantiate_support(support, instance);
			let Some(source) = &block.source else {
				staged.blocks.push(block);
				continue;
			};

			let template = read_template(&self.options.templates.join(source), &equipment.type_eq)?;
			let path = block_path(root, &block);
			staged
				.files
				.push((path.clone(), instantiate_lines(&template, &instance.context)));
			staged.support_blocks += 1;
			staged.imports.push(block_import(plc, &block, path));
		}

		Ok(())
	}

	fn patch_owning_function(
		&mut self,
		plc: &Plc,
		instance: &InstanceBlock,
		call_region: &[String],
		root: &Path,
		staged: &mut InstanceOutputs,
	) -> GenResult<()> {
		if instance.function.is_empty() {
			tracing::warn!(instance = %instance.name, "instance has no owning function; call not generated");
			return Ok(());
		}

		let declared = plc.functions.get(&instance.function);
		let fallback;
		let function = match declared {
			Some(function) => function,
			None => {
				tracing::debug!(function = %instance.function, "function not declared in config sheet");
				fallback = Function::new(instance.function.as_str());
				&fallback
			}
		};

		let path = root
			.join("functions")
			.join(format!("{}.scl", file_stem(&function.name)));
		let existing = match self.workspace.read(&path)? {
			Some(existing) => existing,
			None => {
				match &function.source {
					Some(source) => read_template(&self.options.templates.join(source), &function.name)?,
					None => function.render_skeleton(),
				}
			}
		};

		let outcome = upsert_region(&existing, &instance.name, call_region);
		if outcome.removed > 1 {
			tracing::debug!(function = %function.name, instance = %instance.name, removed = outcome.removed, "removed repeated regions");
		}
		staged.files.push((path.clone(), outcome.text));
		staged.imports.push(ImportRequest {
			plc: plc.name.clone(),
			name: function.name.clone(),
			path,
			number: 0,
			group: function.group.clone(),
			kind: SourceKind::Function,
		});

		Ok(())
	}

	/// Merge collected members into every support block of the PLC. A block
	/// that fails is recorded and the others are still rendered.
	fn render_blocks(&mut self, plc: &Plc, root: &Path, outputs: &mut PlcOutputs) {
		for (name, members) in &outputs.members {
			if !outputs.blocks.contains_key(name) {
				tracing::warn!(plc = %plc.name, block = %name, members = members.len(), "db values target an unknown data block");
			}
		}

		let blocks: Vec<SupportDataBlock> = outputs.blocks.values().cloned().collect();
		for block in blocks {
			let members = outputs
				.members
				.get(&block.name)
				.map_or(&[][..], Vec::as_slice);

			match self.render_block(root, &block, members) {
				Ok(path) => {
					self.plan.report.support_blocks += 1;
					outputs.import(block_import(plc, &block, path));
				}
				Err(error) => {
					tracing::warn!(plc = %plc.name, block = %block.name, %error, "skipping block");
					self.fail(&plc.name, &block.name, &error);
				}
			}
		}
	}

	fn render_block(&mut self, root: &Path, block: &SupportDataBlock, members: &[Member]) -> GenResult<PathBuf> {
		let path = block_path(root, block);
		let existing = match (self.workspace.read(&path)?, &block.source) {
			(Some(existing), _) => Some(existing),
			(None, Some(source)) => Some(read_template(&self.options.templates.join(source), &block.name)?),
			(None, None) => None,
		};

		self.workspace
			.write(&path, merge_struct(existing.as_deref(), block, members));
		Ok(path)
	}

	fn render_tag_tables(&mut self, plc: &Plc, root: &Path, outputs: &mut PlcOutputs) {
		let tables = std::mem::take(&mut outputs.tables);

		for (name, table) in tables {
			if table.is_empty() {
				continue;
			}

			match self.render_tag_table(root, &name, table) {
				Ok(path) => {
					self.plan.report.tag_tables += 1;
					outputs.import(ImportRequest {
						plc: plc.name.clone(),
						name,
						path,
						number: 0,
						group: String::new(),
						kind: SourceKind::TagTable,
					});
				}
				Err(error) => {
					tracing::warn!(plc = %plc.name, table = %name, %error, "skipping tag table");
					self.fail(&plc.name, &name, &error);
				}
			}
		}
	}

	/// Merge `table` into the previous export. An export that is not valid
	/// UTF-8 or XML is rebuilt.
	fn render_tag_table(&mut self, root: &Path, name: &str, table: TagTable) -> GenResult<PathBuf> {
		let path = root.join("tags").join(format!("{}.xml", file_stem(name)));
		let previous = match self.workspace.read(&path) {
			Ok(Some(existing)) => TagTable::parse(&existing),
			Ok(None) => Ok(TagTable::new(name)),
			Err(GenError::Io(error)) if error.kind() == ErrorKind::InvalidData => Err(GenError::Xml(error.to_string())),
			Err(error) => return Err(error),
		};
		let mut merged = previous.unwrap_or_else(|error| {
			tracing::warn!(path = %path.display(), %error, "unreadable tag table; rebuilding it");
			TagTable::new(name)
		});
		merged.name = name.to_string();
		merged.merge(table);

		self.workspace.write(&path, merged.to_xml(&self.options.culture)?);
		Ok(path)
	}
}

/// Tags, constants, type support blocks and DB values contributed by one
/// instance.
fn collect_instance_data(equipment: &EquipmentType, instance: &InstanceBlock, outputs: &mut PlcOutputs) {
	for block in equipment.support_blocks.values() {
		if !outputs.blocks.contains_key(&block.name) {
			outputs.blocks.insert(block.name.clone(), block.clone());
		}
	}

	for (table, tag) in instance_tags(equipment, instance) {
		outputs
			.tables
			.entry(table.clone())
			.or_insert_with(|| TagTable::new(table))
			.add_tag(tag);
	}

	for constant in equipment.constants.values() {
		outputs
			.tables
			.entry(CONSTANT_TABLE.to_string())
			.or_insert_with(|| TagTable::new(CONSTANT_TABLE))
			.add_constant(instantiate_constant(constant, instance));
	}

	for value in equipment
		.db_values
		.values()
		.filter(|value| applies(&value.variants, &instance.variants))
	{
		let block = substitute(&value.data_block, &instance.context, TOKEN_PREFIX);
		let member = substitute(&value.member, &instance.context, TOKEN_PREFIX);
		outputs
			.members
			.entry(block)
			.or_default()
			.push((member, value.type_clause.clone()));
	}
}

/// Instance data block typed by the first library block of `equipment`.
fn generate_instance_db(
	plc: &Plc,
	equipment: &EquipmentType,
	instance: &InstanceBlock,
	root: &Path,
	staged: &mut InstanceOutputs,
) {
	let fb_name = equipment
		.libraries
		.values()
		.next()
		.map_or(equipment.type_eq.as_str(), |library| library.name.as_str());
	let path = root
		.join("instances")
		.join(group_dir(&instance.group))
		.join(format!("{}.db", file_stem(&instance.name)));

	staged
		.files
		.push((path.clone(), instance_db_source(instance, fb_name)));
	staged.imports.push(ImportRequest {
		plc: plc.name.clone(),
		name: instance.name.clone(),
		path,
		number: instance.db_number(),
		group: instance.group.clone(),
		kind: SourceKind::InstanceDb,
	});
}

fn read_template(path: &Path, owner: &str) -> GenResult<String> {
	read_optional(path)?.ok_or_else(|| {
		GenError::MissingTemplate {
			owner: owner.to_string(),
			path: path.display().to_string(),
		}
	})
}

fn block_path(root: &Path, block: &SupportDataBlock) -> PathBuf {
	let extension = if block.is_udt() { "udt" } else { "db" };
	root.join("data_blocks")
		.join(group_dir(&block.group))
		.join(format!("{}.{extension}", file_stem(&block.name)))
}

fn block_import(plc: &Plc, block: &SupportDataBlock, path: PathBuf) -> ImportRequest {
	ImportRequest {
		plc: plc.name.clone(),
		name: block.name.clone(),
		path,
		number: block.number,
		group: block.group.clone(),
		kind: if block.is_udt() {
			SourceKind::Type
		} else {
			SourceKind::DataBlock
		},
	}
}
