//! Remove asset bundles, cascading metadata and directories.

use crate::error::Result;
use crate::registry_path::RegistryPath;
use crate::store::{RegistryStore, RemovedScope};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// What to do with the rest of a batch after hitting an incomplete bundle.
///
/// In strict mode an incomplete bundle has its metadata removed and the
/// remaining batch items are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoveMode {
    /// Stop processing the batch after the first incomplete bundle.
    #[default]
    Strict,
    /// Keep going through the remaining batch items.
    Lenient,
}

/// Result of a remove batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Bundles removed (metadata; directories best-effort).
    Removed(usize),
    /// The user declined the destructive confirmation; nothing was touched.
    Declined,
    /// An incomplete bundle stopped the batch after `removed` removals.
    Stopped {
        /// Bundles removed before the stop, including the incomplete one.
        removed: usize,
    },
}

/// Remove the asset bundles named by `requests`.
///
/// Tags resolve through the default pointer without requiring the record to
/// exist. Incomplete bundles (no completion marker) lose their metadata
/// without confirmation; in [`RemoveMode::Strict`] they also stop the
/// batch. Complete bundles require one confirmation for the whole batch;
/// `confirm` receives a description of everything about to be deleted, so
/// in strict mode batch items past the first incomplete bundle are not
/// part of the prompt.
/// Directory deletion cascades with the metadata (tag dir, then asset dir,
/// then genome dir) and each step tolerates an already-missing key or path.
///
/// # Errors
///
/// Returns store resolution and IO errors. A declined confirmation is the
/// `Declined` outcome, not an error.
pub fn remove_assets(
    store: &mut RegistryStore,
    requests: &[RegistryPath],
    mode: RemoveMode,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> Result<RemoveOutcome> {
    // Resolve every request up front so a single confirmation can cover the
    // whole batch.
    let mut resolved = Vec::with_capacity(requests.len());
    for request in requests {
        let genome = request.require_genome()?.to_string();
        let tag = match request.tag {
            Some(ref tag) => tag.clone(),
            None => store.default_tag(&genome, &request.asset, false)?,
        };
        let complete = store.is_asset_complete(&genome, &request.asset, &tag);
        resolved.push((genome, request.asset.clone(), tag, complete));
    }

    // A strict batch never proceeds past its first incomplete bundle, so
    // later items must not enter the confirmation prompt.
    if mode == RemoveMode::Strict {
        if let Some(stop) = resolved.iter().position(|(_, _, _, complete)| !complete) {
            resolved.truncate(stop + 1);
        }
    }

    let complete_bundles: Vec<String> = resolved
        .iter()
        .filter(|(_, _, _, complete)| *complete)
        .map(|(genome, asset, tag, _)| format!("{genome}/{asset}:{tag}"))
        .collect();
    if !complete_bundles.is_empty() {
        let prompt = format!("remove {}?", complete_bundles.join(", "));
        if !confirm(&prompt) {
            info!("removal declined");
            return Ok(RemoveOutcome::Declined);
        }
    }

    let mut removed = 0;
    for (genome, asset, tag, complete) in resolved {
        if !complete {
            // Incomplete bundle: registry metadata only, no prompt.
            let scope = store.remove_asset(&genome, &asset, &tag);
            store.write()?;
            if scope != RemovedScope::Nothing {
                removed += 1;
                info!(genome, asset, tag, "removed metadata for incomplete bundle");
            }
            if mode == RemoveMode::Strict {
                return Ok(RemoveOutcome::Stopped { removed });
            }
            continue;
        }

        let tag_dir = store.tag_dir(&genome, &asset, &tag);
        let scope = store.remove_asset(&genome, &asset, &tag);
        store.write()?;
        if scope == RemovedScope::Nothing {
            // Duplicate address in one batch; already gone.
            continue;
        }
        removed += 1;

        remove_dir_best_effort(&tag_dir);
        if matches!(scope, RemovedScope::Asset | RemovedScope::Genome) {
            remove_dir_best_effort(&store.genome_folder.join(&genome).join(&asset));
        }
        if scope == RemovedScope::Genome {
            remove_dir_best_effort(&store.genome_folder.join(&genome));
        }
        info!(genome, asset, tag, ?scope, "removed asset bundle");
    }

    Ok(RemoveOutcome::Removed(removed))
}

fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(error) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), %error, "could not delete directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::add_asset;
    use tempfile::TempDir;

    fn setup_complete_asset(dir: &TempDir) -> RegistryStore {
        let source = dir.path().join("data.txt");
        fs::write(&source, b"x").unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/fasta").unwrap();
        add_asset(&mut store, &path, &source).unwrap();
        store
    }

    #[test]
    fn test_remove_cascades_from_single_call() {
        let dir = TempDir::new().unwrap();
        let mut store = setup_complete_asset(&dir);
        let bundle = store.tag_dir("hg38", "fasta", "default");
        assert!(bundle.exists());

        let requests = [RegistryPath::parse("hg38/fasta").unwrap()];
        let outcome = remove_assets(
            &mut store,
            &requests,
            RemoveMode::Strict,
            &mut |_| true,
        )
        .unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed(1));
        // last tag -> asset entry gone; last asset -> genome entry gone
        assert!(store.genome("hg38").is_none());
        assert!(!bundle.exists());
        assert!(!store.genome_folder.join("hg38").exists());
    }

    #[test]
    fn test_remove_declined_leaves_everything() {
        let dir = TempDir::new().unwrap();
        let mut store = setup_complete_asset(&dir);

        let requests = [RegistryPath::parse("hg38/fasta").unwrap()];
        let outcome = remove_assets(
            &mut store,
            &requests,
            RemoveMode::Strict,
            &mut |_| false,
        )
        .unwrap();

        assert_eq!(outcome, RemoveOutcome::Declined);
        assert!(store.genome("hg38").is_some());
        assert!(store.tag_dir("hg38", "fasta", "default").exists());
    }

    #[test]
    fn test_remove_incomplete_stops_batch_in_strict_mode() {
        let dir = TempDir::new().unwrap();
        let mut store = setup_complete_asset(&dir);
        // second asset registered but with no completion marker
        use crate::store::{AssetRecord, Relatives};
        use std::collections::BTreeMap;
        store.update_tag(
            "hg38",
            "half_built",
            "default",
            AssetRecord {
                path: std::path::PathBuf::from("hg38/half_built/default"),
                seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
                checksum: None,
                relatives: Relatives::default(),
                created_at: chrono::Utc::now(),
            },
            None,
        );
        store.set_default_pointer("hg38", "half_built", "default").unwrap();

        let requests = [
            RegistryPath::parse("hg38/half_built").unwrap(),
            RegistryPath::parse("hg38/fasta").unwrap(),
        ];
        let mut prompted = false;
        let outcome = remove_assets(&mut store, &requests, RemoveMode::Strict, &mut |_| {
            prompted = true;
            true
        })
        .unwrap();

        assert_eq!(outcome, RemoveOutcome::Stopped { removed: 1 });
        // the complete bundle later in the batch survives and was never
        // offered for deletion
        assert!(!prompted);
        assert!(store.tag_record("hg38", "fasta", "default").is_some());
        assert!(store.asset("hg38", "half_built").is_none());
    }

    #[test]
    fn test_remove_duplicate_addresses_counted_once() {
        let dir = TempDir::new().unwrap();
        let mut store = setup_complete_asset(&dir);

        let requests = [
            RegistryPath::parse("hg38/fasta").unwrap(),
            RegistryPath::parse("hg38/fasta").unwrap(),
        ];
        let outcome =
            remove_assets(&mut store, &requests, RemoveMode::Lenient, &mut |_| true).unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed(1));
        assert!(store.genome("hg38").is_none());
    }

    #[test]
    fn test_remove_incomplete_continues_in_lenient_mode() {
        let dir = TempDir::new().unwrap();
        let mut store = setup_complete_asset(&dir);
        use crate::store::{AssetRecord, Relatives};
        use std::collections::BTreeMap;
        store.update_tag(
            "hg38",
            "half_built",
            "default",
            AssetRecord {
                path: std::path::PathBuf::from("hg38/half_built/default"),
                seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
                checksum: None,
                relatives: Relatives::default(),
                created_at: chrono::Utc::now(),
            },
            None,
        );
        store.set_default_pointer("hg38", "half_built", "default").unwrap();

        let requests = [
            RegistryPath::parse("hg38/half_built").unwrap(),
            RegistryPath::parse("hg38/fasta").unwrap(),
        ];
        let outcome = remove_assets(&mut store, &requests, RemoveMode::Lenient, &mut |_| true)
            .unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed(2));
        assert!(store.genome("hg38").is_none());
    }

    #[test]
    fn test_remove_unregistered_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let requests = [RegistryPath::parse("hg38/fasta").unwrap()];
        let outcome =
            remove_assets(&mut store, &requests, RemoveMode::Lenient, &mut |_| true).unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed(0));
    }
}
