//! Convenient re-exports for common usage.
//!
//! ```
//! use genoreg::prelude::*;
//! ```

// Core types
pub use crate::error::{GenoregError, Result};
pub use crate::store::{
    AssetEntry, AssetRecord, GenomeRecord, RegistryStore, Relatives, RemovedScope,
    COMPLETE_MARKER, DEFAULT_TAG,
};

// Addressing
pub use crate::registry_path::RegistryPath;

// Recipes and builds
pub use crate::build::{BuildOrchestrator, BuildOutcome, BuildRequest};
pub use crate::recipe::{AssetRecipe, CommandTemplate, RecipeCatalog};

// Collaborators
pub use crate::digest::{Blake3FastaChecksum, FastaChecksum, FastaDigest};
pub use crate::remote::{AssetServer, HttpAssetServer};
pub use crate::runner::{CommandRunner, ShellRunner};

// Lifecycle operations
pub use crate::ops::{add_asset, pull_asset, remove_assets, tag_asset, RemoveMode, RemoveOutcome};
