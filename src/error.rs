//! Error types for genoreg registry operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for genoreg operations.
pub type Result<T> = std::result::Result<T, GenoregError>;

/// Errors that can occur during genoreg registry operations.
#[derive(Error, Debug)]
pub enum GenoregError {
    /// Malformed registry path string.
    #[error("cannot parse registry path: {0}")]
    Parse(String),

    /// Genome supplied both in the address and as a batch argument, and they disagree.
    #[error("genome in address '{address}' conflicts with batch genome '{batch}'")]
    GenomeMismatch {
        /// Genome named inside the registry path.
        address: String,
        /// Genome supplied as the batch-level argument.
        batch: String,
    },

    /// A recipe-required raw input was not supplied.
    #[error("asset '{asset}' requires input '--input {input}=<path>'")]
    MissingInput {
        /// Asset being built.
        asset: String,
        /// Name of the missing input flag.
        input: String,
    },

    /// A recipe-required parent asset is not registered.
    #[error("asset '{asset}' requires asset '{requirement}', which is not registered")]
    MissingRequirement {
        /// Asset being built.
        asset: String,
        /// Parent asset that could not be resolved.
        requirement: String,
    },

    /// Genome identity diverged from the recorded collection checksum.
    #[error("checksum mismatch for genome '{genome}': recorded {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Genome name.
        genome: String,
        /// Checksum recorded in the registry.
        expected: String,
        /// Checksum computed from the new sequence collection.
        actual: String,
    },

    /// A source or registered path does not exist on disk.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// A destination is not write/execute-accessible.
    #[error("insufficient permissions on {0}")]
    Permission(PathBuf),

    /// The requested batch shape is not supported.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Registry entry not found.
    #[error("asset not found: {genome}/{asset}:{tag}")]
    NotFound {
        /// Genome name.
        genome: String,
        /// Asset name.
        asset: String,
        /// Tag requested (or resolved default).
        tag: String,
    },

    /// A seek key is not registered for an asset tag.
    #[error("seek key '{seek_key}' not registered for {genome}/{asset}:{tag}")]
    MissingSeekKey {
        /// Genome name.
        genome: String,
        /// Asset name.
        asset: String,
        /// Tag name.
        tag: String,
        /// Requested seek key.
        seek_key: String,
    },

    /// A recipe template references an undeclared placeholder.
    #[error("recipe '{recipe}' references undeclared placeholder '{{{placeholder}}}'")]
    InvalidRecipe {
        /// Recipe name.
        recipe: String,
        /// Offending placeholder.
        placeholder: String,
    },

    /// An external command exited non-zero.
    #[error("command failed with status {status}: {command}")]
    CommandFailed {
        /// The shell command that failed.
        command: String,
        /// Exit status code (-1 if terminated by signal).
        status: i32,
    },

    /// Remote asset server returned an error response.
    #[error("remote server error: {0}")]
    Remote(String),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
