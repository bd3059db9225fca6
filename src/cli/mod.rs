//! CLI command handlers.
//!
//! Business logic for CLI commands, separated from argument parsing for
//! testability. Handlers return data or formatted strings; `main.rs` only
//! parses arguments, wires collaborators and prints.

use crate::build::{BuildOrchestrator, BuildOutcome, BuildRequest};
use crate::digest::Blake3FastaChecksum;
use crate::error::{GenoregError, Result};
use crate::recipe::RecipeCatalog;
use crate::registry_path::RegistryPath;
use crate::remote::AssetServer;
use crate::runner::ShellRunner;
use crate::store::RegistryStore;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

/// Parse `--input name=path` into its parts.
///
/// # Errors
///
/// Returns `Parse` when the `=` separator or either side is missing.
pub fn parse_input_spec(spec: &str) -> Result<(String, PathBuf)> {
    match spec.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(GenoregError::Parse(format!(
            "input '{spec}' must have the form name=path"
        ))),
    }
}

/// Parse a batch of registry path strings and reconcile each with the
/// batch-level genome argument.
///
/// # Errors
///
/// Returns parse and genome-mismatch errors.
pub fn resolve_paths(raw: &[String], batch_genome: Option<&str>) -> Result<Vec<RegistryPath>> {
    let mut paths = Vec::with_capacity(raw.len());
    for input in raw {
        let mut path = RegistryPath::parse(input)?;
        path.resolve_genome(batch_genome)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Reject batches of more than one address for single-asset operations.
///
/// # Errors
///
/// Returns `NotImplemented` naming the operation for a multi-asset batch,
/// `Parse` for an empty one.
pub fn single_path<'a>(operation: &str, paths: &'a [RegistryPath]) -> Result<&'a RegistryPath> {
    match paths {
        [path] => Ok(path),
        [] => Err(GenoregError::Parse(format!(
            "{operation} requires a registry path"
        ))),
        _ => Err(GenoregError::NotImplemented(format!(
            "multi-asset {operation}"
        ))),
    }
}

/// Run a build batch with the production collaborators.
///
/// # Errors
///
/// Propagates orchestrator errors.
pub fn handle_build(store: &mut RegistryStore, request: &BuildRequest) -> Result<BuildOutcome> {
    let catalog = RecipeCatalog::builtin()?;
    let runner = ShellRunner;
    let checksum = Blake3FastaChecksum;
    BuildOrchestrator::new(store, &catalog, &runner, &checksum).run(request)
}

/// Format the local registry listing: genomes, assets and tags.
#[must_use]
pub fn format_local_list(store: &RegistryStore) -> String {
    let mut out = String::new();
    if store.genomes.is_empty() {
        out.push_str("no genomes registered\n");
        return out;
    }
    for (genome, record) in &store.genomes {
        let _ = writeln!(out, "{genome}:");
        for (asset, entry) in &record.assets {
            let tags: Vec<String> = entry
                .tags
                .keys()
                .map(|tag| {
                    if entry.default_tag.as_deref() == Some(tag) {
                        format!("{tag}*")
                    } else {
                        tag.clone()
                    }
                })
                .collect();
            let _ = writeln!(out, "  {asset}: {}", tags.join(", "));
        }
    }
    out
}

/// Format the remote listing from an asset server.
///
/// # Errors
///
/// Propagates server errors.
pub fn format_remote_list(server: &dyn AssetServer) -> Result<String> {
    let mut out = String::new();
    for genome in server.list_available_genomes()? {
        let assets = server.list_assets_by_genome(&genome)?;
        let _ = writeln!(out, "{genome}: {}", assets.join(", "));
    }
    if out.is_empty() {
        out.push_str("no genomes available\n");
    }
    Ok(out)
}

/// Ask the user for a yes/no confirmation on stdin.
#[must_use]
pub fn confirm_stdin(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
