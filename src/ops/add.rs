//! Import an out-of-registry path as a tagged asset.

use crate::digest::directory_digest;
use crate::error::{GenoregError, Result};
use crate::registry_path::RegistryPath;
use crate::store::{AssetRecord, RegistryStore, Relatives, COMPLETE_MARKER};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Import `source` into the registry as the asset named by `path`, with no
/// recipe execution.
///
/// The target tag is the address's explicit tag, else the asset's current
/// default tag (falling back to the deterministic label for a first
/// import). With no seek key the whole file or directory tree is copied and
/// the seek key `"."` records the whole bundle; with a seek key a single
/// file is copied and recorded under that key, and a directory source is
/// rejected. The import is marked complete and becomes the asset's default
/// tag.
///
/// Returns the bundle directory.
///
/// # Errors
///
/// Returns `PathNotFound` if `source` does not exist, `Parse` for a seek
/// key with a directory source, plus store and IO errors.
pub fn add_asset(
    store: &mut RegistryStore,
    path: &RegistryPath,
    source: &Path,
) -> Result<PathBuf> {
    let genome = path.require_genome()?.to_string();
    let asset = &path.asset;
    let tag = match path.tag {
        Some(ref tag) => tag.clone(),
        None => store.default_tag(&genome, asset, false)?,
    };

    if !source.exists() {
        return Err(GenoregError::PathNotFound(source.to_path_buf()));
    }
    if let Some(ref seek_key) = path.seek_key {
        if !source.is_file() {
            return Err(GenoregError::Parse(format!(
                "seek key '{seek_key}' requires a file source, got {}",
                source.display()
            )));
        }
    }

    let bundle = store.tag_dir(&genome, asset, &tag);
    fs::create_dir_all(&bundle)?;

    let mut seek_keys = BTreeMap::from([(".".to_string(), ".".to_string())]);
    match path.seek_key {
        Some(ref seek_key) => {
            let file_name = source
                .file_name()
                .ok_or_else(|| GenoregError::PathNotFound(source.to_path_buf()))?;
            fs::copy(source, bundle.join(file_name))?;
            seek_keys.insert(
                seek_key.clone(),
                file_name.to_string_lossy().into_owned(),
            );
        }
        None => {
            copy_tree(source, &bundle)?;
        }
    }

    // Imports register as finished bundles.
    fs::write(bundle.join(COMPLETE_MARKER), b"")?;

    let record = AssetRecord {
        path: PathBuf::from(&genome).join(asset).join(&tag),
        seek_keys,
        checksum: Some(directory_digest(&bundle)?),
        relatives: Relatives::default(),
        created_at: Utc::now(),
    };
    store.update_tag(&genome, asset, &tag, record, Some("imported asset"));
    store.set_default_pointer(&genome, asset, &tag)?;
    store.write()?;

    info!(genome, asset, tag, source = %source.display(), "added asset");
    Ok(bundle)
}

/// Copy a file into `dest`, or a directory's contents into `dest`.
fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    if source.is_file() {
        let file_name = source
            .file_name()
            .ok_or_else(|| GenoregError::PathNotFound(source.to_path_buf()))?;
        fs::copy(source, dest.join(file_name))?;
        return Ok(());
    }
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_missing_source_is_error() {
        let dir = TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/annotations").unwrap();
        let err = add_asset(&mut store, &path, &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, GenoregError::PathNotFound(_)));
    }

    #[test]
    fn test_add_directory_registers_whole_bundle() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        fs::write(source.join("nested/b.txt"), b"b").unwrap();

        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/annotations:v1").unwrap();
        let bundle = add_asset(&mut store, &path, &source).unwrap();

        assert!(bundle.join("a.txt").exists());
        assert!(bundle.join("nested/b.txt").exists());
        assert!(store.is_asset_complete("hg38", "annotations", "v1"));

        // seek key "." resolves back to the bundle
        let resolved = store.get_asset("hg38", "annotations", None, None).unwrap();
        assert_eq!(resolved, bundle);
    }

    #[test]
    fn test_add_file_with_seek_key() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("genes.gtf");
        fs::write(&source, b"gtf data").unwrap();

        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/annotations.gtf").unwrap();
        let bundle = add_asset(&mut store, &path, &source).unwrap();

        let resolved = store
            .get_asset("hg38", "annotations", None, Some("gtf"))
            .unwrap();
        assert_eq!(resolved, bundle.join("genes.gtf"));
    }

    #[test]
    fn test_add_seek_key_with_directory_source_rejected() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("bundle");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("genes.gtf"), b"gtf data").unwrap();

        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/annotations.gtf").unwrap();
        let err = add_asset(&mut store, &path, &source).unwrap_err();
        assert!(matches!(err, GenoregError::Parse(_)));
        assert!(store.genome("hg38").is_none());
    }

    #[test]
    fn test_add_sets_default_tag() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.txt");
        fs::write(&source, b"x").unwrap();

        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let path = RegistryPath::parse("hg38/annotations:v2").unwrap();
        add_asset(&mut store, &path, &source).unwrap();

        assert_eq!(
            store.default_tag("hg38", "annotations", true).unwrap(),
            "v2"
        );
    }
}
