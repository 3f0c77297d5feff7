//! `plcgen_core` turns a tabular equipment configuration into PLC source
//! artifacts: SCL functions calling every configured piece of equipment,
//! instance and support data blocks, and tag tables ready for import into the
//! engineering tool.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Workbook (xlsx / ods / csv directory)
//!   -> Extractor (main sheet rows + coordinate blocks -> Model)
//!   -> Instancer (templates + substitution + variants -> per-instance text)
//!   -> Patcher (idempotent REGION upserts into owning functions)
//!   -> Struct merge (incremental data block members)
//!   -> Tag tables (XML export merged with the previous export)
//!   -> Workspace commit + backend imports
//! ```
//!
//! ## Modules
//!
//! - [`config`]: loading `plcgen.toml`.
//! - [`tabular`]: the [`TabularSource`] seam and the in-memory [`Workbook`].
//! - [`schema`]: fixed sheet layout, anchor cells and column offsets.
//! - [`numbering`]: block numbers and names derived from configuration order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use plcgen_core::Cancellation;
//! use plcgen_core::ExtractOptions;
//! use plcgen_core::GenerateOptions;
//! use plcgen_core::ManifestBackend;
//! use plcgen_core::PlcgenConfig;
//! use plcgen_core::Workspace;
//! use plcgen_core::tabular::Workbook;
//!
//! let config = PlcgenConfig::load_or_default(Path::new(".")).unwrap();
//! let workbook = Workbook::open(&config.workbook).unwrap();
//! let cancel = Cancellation::new();
//!
//! let (model, _) =
//! 	plcgen_core::extract_model(&workbook, &ExtractOptions::from_config(&config), &cancel).unwrap();
//!
//! let mut workspace = Workspace::new();
//! let mut backend = ManifestBackend::in_memory();
//! let report = plcgen_core::generate(
//! 	&model,
//! 	&GenerateOptions::from_config(&config),
//! 	&mut workspace,
//! 	&mut backend,
//! 	&cancel,
//! )
//! .unwrap();
//! println!("{} instance(s) generated", report.instances_generated);
//! ```

pub use backend::*;
pub use cancel::*;
pub use config::*;
pub use error::*;
pub use extractor::*;
pub use generator::*;
pub use instancer::*;
pub use model::*;
pub use patcher::*;
pub use struct_merge::*;
pub use substitution::*;
pub use tag_table::*;
pub use workspace::*;

mod backend;
mod cancel;
pub mod config;
#[allow(unused_assignments)]
mod error;
mod extractor;
mod generator;
mod instancer;
mod model;
pub mod numbering;
mod patcher;
pub mod schema;
mod struct_merge;
mod substitution;
pub mod tabular;
mod tag_table;
mod workspace;

#[cfg(test)]
mod __fixtures;
