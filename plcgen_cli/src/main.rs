use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use plcgen_cli::Commands;
use plcgen_cli::OutputFormat;
use plcgen_cli::PlcgenCli;
use plcgen_core::Cancellation;
use plcgen_core::EngineeringBackend;
use plcgen_core::ExtractOptions;
use plcgen_core::ExtractReport;
use plcgen_core::Failure;
use plcgen_core::GenerateOptions;
use plcgen_core::MANIFEST_FILE;
use plcgen_core::ManifestBackend;
use plcgen_core::Model;
use plcgen_core::PlcgenConfig;
use plcgen_core::VariantSet;
use plcgen_core::Workspace;
use plcgen_core::extract_model;
use plcgen_core::tabular::Workbook;
use serde::Serialize;
use similar::ChangeTag;
use similar::TextDiff;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = PlcgenCli::parse();

	// Respect NO_COLOR env var, --no-color flag and non-terminal output.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Generate {
			status,
			dry_run,
			diff,
		}) => run_generate(&args, status.as_deref(), *dry_run, *diff),
		Some(Commands::List { status, format }) => run_list(&args, status.as_deref(), *format),
		None => {
			eprintln!("No subcommand specified. Run `plcgen --help` for usage.");
			process::exit(1);
		}
	};

	match result {
		Ok(Outcome::Success) => {}
		Ok(Outcome::Failed) => process::exit(1),
		Err(e) => {
			match e.downcast::<plcgen_core::GenError>() {
				Ok(gen_err) => {
					let report: miette::Report = (*gen_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(2);
		}
	}
}

/// Whether a command completed without item failures.
enum Outcome {
	Success,
	Failed,
}

/// Log to stderr. `PLCGEN_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose {
		"plcgen_core=debug"
	} else {
		"plcgen_core=warn"
	};
	let filter =
		EnvFilter::try_from_env("PLCGEN_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init()
		.ok();
}

fn resolve_root(args: &PlcgenCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(args: &PlcgenCli, status: Option<&str>) -> Result<PlcgenConfig, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let mut config = PlcgenConfig::load_or_default(&root)?;
	if let Some(status) = status {
		config.status = status.to_string();
	}

	Ok(config)
}

fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

fn run_init(args: &PlcgenCli) -> Result<Outcome, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config_path = root.join("plcgen.toml");
	let templates_path = root.join("templates");

	let config_exists = PlcgenConfig::resolve_path(&root);
	match &config_exists {
		Some(existing) => println!("Config file already exists: {}", existing.display()),
		None => {
			let sample_config = "# plcgen configuration\n\n# Workbook describing the \
			                     equipment: an .xlsx, .xls or .ods file, or a\n# directory \
			                     holding one <sheet>.csv file per sheet.\nworkbook = \
			                     \"equipment.xlsx\"\n\n# Generated sources, one directory per \
			                     PLC.\noutput = \"generated\"\n\n# <typeEq>.scl templates of \
			                     extended equipment types.\ntemplates = \"templates\"\n\n# Only \
			                     rows whose status cell contains this text are generated.\n# \
			                     status = \"Released\"\n\n# Maximum number of instances per \
			                     PLC.\n# max_instances = 200\n\n# [sheets]\n# main = \
			                     \"Main\"\n# config = \"Config\"\n\n# [tags]\n# culture = \
			                     \"en-US\"\n";

			std::fs::write(&config_path, sample_config)?;
			println!("Created plcgen.toml");
		}
	}

	if templates_path.is_dir() {
		println!("Templates directory already exists: {}", templates_path.display());
	} else {
		std::fs::create_dir_all(&templates_path)?;
		println!("Created templates directory: {}", templates_path.display());
	}

	if config_exists.is_none() {
		println!();
		println!("Next steps:");
		println!("  1. Point `workbook` in plcgen.toml at your equipment workbook");
		println!("  2. Add a <typeEq>.scl template for every extended equipment type");
		println!("  3. Run `plcgen generate --dry-run` to preview the generated sources");
	}

	Ok(Outcome::Success)
}

fn extract(
	config: &PlcgenConfig,
	cancel: &Cancellation,
) -> Result<(Model, ExtractReport), Box<dyn std::error::Error>> {
	let workbook = Workbook::open(&config.workbook)?;
	let options = ExtractOptions::from_config(config);
	Ok(extract_model(&workbook, &options, cancel)?)
}

fn run_generate(
	args: &PlcgenCli,
	status: Option<&str>,
	dry_run: bool,
	diff: bool,
) -> Result<Outcome, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(args, status)?;
	let cancel = Cancellation::new();

	let (model, extraction) = extract(&config, &cancel)?;
	print_extraction(&extraction);

	let options = GenerateOptions::from_config(&config);
	let mut workspace = Workspace::new();
	let plan = plcgen_core::plan(&model, &options, &mut workspace, &cancel)?;

	if dry_run {
		let changes = workspace.changes();
		if changes.is_empty() {
			println!("All generated files are already up to date.");
		} else {
			println!("Dry run: would write {} file(s):", changes.len());
			for change in &changes {
				let label = if change.is_new() { "new" } else { "modified" };
				println!("  {} {}", colored!(label, yellow), make_relative(&change.path, &root));
				if diff {
					print_diff(change.original.as_deref().unwrap_or_default(), &change.content);
				}
			}
		}

		print_failures(&plan.report.failures);
		return Ok(outcome(plan.report.has_failures()));
	}

	let mut backend = ManifestBackend::new(config.output.join(MANIFEST_FILE));
	let report = plcgen_core::apply(plan, &mut workspace, &mut backend)?;
	backend.close()?;

	if report.files_written == 0 {
		println!("All generated files are already up to date.");
	} else {
		println!("Wrote {} file(s).", report.files_written);
	}
	println!(
		"Generated {} instance(s), {} support block(s) and {} tag table(s); {} import request(s) \
		 recorded in {}.",
		report.instances_generated,
		report.support_blocks,
		report.tag_tables,
		report.imports,
		make_relative(&config.output.join(MANIFEST_FILE), &root),
	);

	print_failures(&report.failures);
	Ok(outcome(report.has_failures()))
}

fn outcome(failed: bool) -> Outcome {
	if failed {
		Outcome::Failed
	} else {
		Outcome::Success
	}
}

fn print_extraction(report: &ExtractReport) {
	println!(
		"Extracted {} instance(s) from {} matching row(s).",
		report.instances, report.rows_matched
	);

	let dropped = report.rows_skipped + report.row_failures;
	if dropped > 0 {
		println!(
			"{} {dropped} row(s) skipped; run with --verbose for details.",
			colored!("warning:", yellow)
		);
	}

	if report.block_failures + report.record_failures > 0 {
		println!(
			"{} {} table(s) and {} table record(s) could not be read; run with --verbose for details.",
			colored!("warning:", yellow),
			report.block_failures,
			report.record_failures
		);
	}
}

fn print_failures(failures: &[Failure]) {
	if failures.is_empty() {
		return;
	}

	eprintln!(
		"{} {} item(s) failed:",
		colored!("error:", red),
		failures.len()
	);
	for failure in failures {
		eprintln!("  [{}] {}: {}", failure.plc, failure.item, failure.reason);
	}
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				print!("    {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				print!("    {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				print!("     {change}");
			}
		}
	}
}

#[derive(Serialize)]
struct Listing<'a> {
	plcs: Vec<ListedPlc<'a>>,
	report: &'a ExtractReport,
}

#[derive(Serialize)]
struct ListedPlc<'a> {
	name: &'a str,
	functions: Vec<&'a str>,
	instances: Vec<ListedInstance<'a>>,
}

#[derive(Serialize)]
struct ListedInstance<'a> {
	name: &'a str,
	type_eq: &'a str,
	eq_name: &'a str,
	number: u32,
	group: &'a str,
	function: &'a str,
	variants: &'a VariantSet,
}

fn run_list(
	args: &PlcgenCli,
	status: Option<&str>,
	format: OutputFormat,
) -> Result<Outcome, Box<dyn std::error::Error>> {
	let config = load_config(args, status)?;
	let (model, extraction) = extract(&config, &Cancellation::new())?;

	match format {
		OutputFormat::Json => {
			let listing = Listing {
				plcs: model
					.plcs
					.values()
					.map(|plc| {
						ListedPlc {
							name: &plc.name,
							functions: plc.functions.keys().map(String::as_str).collect(),
							instances: plc
								.instances
								.values()
								.map(|instance| {
									ListedInstance {
										name: &instance.name,
										type_eq: &instance.type_eq,
										eq_name: &instance.eq_name,
										number: instance.db_number(),
										group: &instance.group,
										function: &instance.function,
										variants: &instance.variants,
									}
								})
								.collect(),
						}
					})
					.collect(),
				report: &extraction,
			};
			println!("{}", serde_json::to_string(&listing)?);
		}
		OutputFormat::Text => {
			if model.plcs.is_empty() {
				println!("No instances found.");
				return Ok(Outcome::Success);
			}

			for plc in model.plcs.values() {
				println!(
					"{}",
					colored!(format!("{} ({} instance(s))", plc.name, plc.instances.len()), bold)
				);
				for instance in plc.instances.values() {
					let number = match instance.db_number() {
						0 => "auto".to_string(),
						number => number.to_string(),
					};
					println!(
						"  {} [{}] #{number} -> {}",
						instance.name, instance.type_eq, instance.function
					);
				}
			}

			println!(
				"\n{} PLC(s), {} instance(s)",
				model.plcs.len(),
				model.instance_count()
			);
		}
	}

	Ok(Outcome::Success)
}
