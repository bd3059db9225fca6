// Clippy configuration for the genoreg crate
// Allow format string style choices
#![allow(clippy::uninlined_format_args)]
// Allow missing docs for internal items
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Doc backticks optional
#![allow(clippy::doc_markdown)]
// Allow map().unwrap_or() pattern
#![allow(clippy::map_unwrap_or)]

//! genoreg: genome asset registry
//!
//! genoreg manages versioned reference-genome assets—sequence collections,
//! aligner indexes, annotations—addressed by (genome, asset, tag, seek key)
//! and built via declarative recipes that invoke external command-line
//! tools.
//!
//! # Quick Start
//!
//! ```no_run
//! use genoreg::prelude::*;
//! use std::path::Path;
//!
//! // Open or create the registry
//! let mut store = RegistryStore::open(Path::new("/data/genomes"))?;
//!
//! // Import an annotation file as a tagged asset
//! let path = RegistryPath::parse("hg38/annotations.gtf:v1")?;
//! add_asset(&mut store, &path, Path::new("genes.gtf"))?;
//!
//! // Resolve it back
//! let gtf = store.get_asset("hg38", "annotations", None, Some("gtf"))?;
//! println!("{}", gtf.display());
//! # Ok::<(), genoreg::error::GenoregError>(())
//! ```
//!
//! # Architecture
//!
//! - **Registry path resolver** - parses `[protocol://]genome/asset[.seek_key][:tag]`
//! - **Recipe catalog** - static, load-validated build specifications
//! - **Build orchestrator** - resolves parents and inputs, runs recipes,
//!   registers results with directory digests
//! - **Registry store** - strongly typed genome/asset/tag tree mirroring
//!   one YAML file, mutators staged until `write()`
//! - **Lifecycle operations** - add, remove, tag, pull
//!
//! # Integrity
//!
//! Asset bundles are digested with BLAKE3 over the sorted
//! (relative path, file hash) pairs, and each genome's identity is fixed by
//! a sequence-collection checksum set at first fasta ingestion.

pub mod build;
pub mod cli;
pub mod digest;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod recipe;
pub mod registry_path;
pub mod remote;
pub mod runner;
pub mod store;

pub use error::{GenoregError, Result};
pub use registry_path::RegistryPath;
pub use store::RegistryStore;
