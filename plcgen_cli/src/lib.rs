use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Generate PLC sources from an equipment workbook.",
	long_about = "plcgen reads a workbook describing PLCs, equipment types and equipment \
	              instances and generates SCL functions, instance and support data blocks \
	              and tag tables for the engineering tool.\n\nRegenerating merges into the \
	              previous output: generated call regions are replaced in place, data block \
	              members are added without dropping hand-written ones and tag tables keep \
	              tags that are no longer configured.\n\nQuick start:\n  plcgen init      \
	              Create plcgen.toml and the templates directory\n  plcgen list      Show \
	              the instances the workbook defines\n  plcgen generate  Write sources and \
	              the import manifest"
)]
pub struct PlcgenCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output, including debug logs.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize plcgen in a project.
	///
	/// Creates a commented `plcgen.toml` and an empty `templates` directory.
	/// Existing files are left untouched.
	Init,
	/// Generate sources for every matching instance in the workbook.
	///
	/// Extracts the model from the workbook, expands templates, patches the
	/// owning functions, merges data blocks and tag tables, writes the changed
	/// files and records an import request for each generated source in
	/// `import-manifest.json` inside the output directory.
	///
	/// Exits with a non-zero status code when an instance or import failed.
	Generate {
		/// Only generate rows whose status cell contains this text. Overrides
		/// `status` from plcgen.toml.
		#[arg(long)]
		status: Option<String>,

		/// Preview changes without writing files or the import manifest.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// With `--dry-run`, show a unified diff for each changed file.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
	/// List the PLCs and instances extracted from the workbook.
	List {
		/// Only list rows whose status cell contains this text. Overrides
		/// `status` from plcgen.toml.
		#[arg(long)]
		status: Option<String>,

		/// Output format of the listing.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
