//! Fetch a built asset bundle from a remote asset server.

use crate::digest::directory_digest;
use crate::error::{GenoregError, Result};
use crate::remote::AssetServer;
use crate::store::{AssetRecord, RegistryStore, Relatives, COMPLETE_MARKER};
use chrono::Utc;
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

/// Download a tagged asset's archive and register it locally.
///
/// The genome folder's parent must exist and be write/execute-accessible
/// before any network call; otherwise the pull aborts early with
/// `Permission`. With `unpack` the gzipped tarball is extracted into the
/// bundle directory and a completion marker written; otherwise the archive
/// file is stored as-is and registered under the seek key `archive`.
///
/// Returns the bundle directory.
///
/// # Errors
///
/// Returns `Permission`, remote transport errors, and store/IO errors.
pub fn pull_asset(
    store: &mut RegistryStore,
    server: &dyn AssetServer,
    genome: &str,
    asset: &str,
    tag: Option<&str>,
    unpack: bool,
) -> Result<PathBuf> {
    let tag = match tag {
        Some(tag) => tag.to_string(),
        None => store.default_tag(genome, asset, false)?,
    };

    let parent = store
        .genome_folder
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_writable(parent)?;

    info!(genome, asset, tag, "downloading asset archive");
    let archive = server.download_asset(genome, asset, &tag)?;

    let bundle = store.tag_dir(genome, asset, &tag);
    fs::create_dir_all(&bundle)?;

    let mut seek_keys = BTreeMap::from([(".".to_string(), ".".to_string())]);
    if unpack {
        tar::Archive::new(GzDecoder::new(Cursor::new(archive))).unpack(&bundle)?;
        fs::write(bundle.join(COMPLETE_MARKER), b"")?;
    } else {
        let archive_name = format!("{asset}__{tag}.tgz");
        fs::write(bundle.join(&archive_name), archive)?;
        seek_keys.insert("archive".to_string(), archive_name);
    }

    let record = AssetRecord {
        path: PathBuf::from(genome).join(asset).join(&tag),
        seek_keys,
        checksum: Some(directory_digest(&bundle)?),
        relatives: Relatives::default(),
        created_at: Utc::now(),
    };
    store.update_tag(genome, asset, &tag, record, Some("pulled asset"));
    store.set_default_pointer(genome, asset, &tag)?;
    store.write()?;

    info!(genome, asset, tag, bundle = %bundle.display(), "pull complete");
    Ok(bundle)
}

/// The path must exist and be write/execute-accessible.
fn ensure_writable(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(GenoregError::Permission(path.to_path_buf()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)?.permissions().mode();
        if mode & 0o200 == 0 || mode & 0o100 == 0 {
            return Err(GenoregError::Permission(path.to_path_buf()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves canned archives from memory.
    struct FixtureServer {
        archive: Vec<u8>,
        calls: std::cell::Cell<usize>,
    }

    impl FixtureServer {
        fn new(archive: Vec<u8>) -> Self {
            Self {
                archive,
                calls: std::cell::Cell::new(0),
            }
        }
    }

    impl AssetServer for FixtureServer {
        fn list_available_genomes(&self) -> Result<Vec<String>> {
            Ok(vec!["hg38".to_string()])
        }

        fn list_assets_by_genome(&self, _genome: &str) -> Result<Vec<String>> {
            Ok(vec!["bowtie2_index".to_string()])
        }

        fn download_asset(&self, _genome: &str, _asset: &str, _tag: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.archive.clone())
        }
    }

    fn toy_archive() -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let data = b"index bytes";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "hg38.1.bt2", &data[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_pull_unpacks_and_registers() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let server = FixtureServer::new(toy_archive());

        let bundle = pull_asset(
            &mut store,
            &server,
            "hg38",
            "bowtie2_index",
            Some("default"),
            true,
        )
        .unwrap();

        assert!(bundle.join("hg38.1.bt2").exists());
        assert!(store.is_asset_complete("hg38", "bowtie2_index", "default"));
        assert_eq!(
            store.default_tag("hg38", "bowtie2_index", true).unwrap(),
            "default"
        );
    }

    #[test]
    fn test_pull_without_unpack_keeps_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let server = FixtureServer::new(toy_archive());

        let bundle = pull_asset(
            &mut store,
            &server,
            "hg38",
            "bowtie2_index",
            None,
            false,
        )
        .unwrap();

        assert!(bundle.join("bowtie2_index__default.tgz").exists());
        let resolved = store
            .get_asset("hg38", "bowtie2_index", None, Some("archive"))
            .unwrap();
        assert_eq!(resolved, bundle.join("bowtie2_index__default.tgz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_pull_unwritable_parent_aborts_before_network() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let parent = dir.path().join("locked");
        let genomes = parent.join("genomes");
        fs::create_dir_all(&genomes).unwrap();
        let mut store = RegistryStore::open(&genomes).unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o500)).unwrap();

        let server = FixtureServer::new(toy_archive());
        let err = pull_asset(&mut store, &server, "hg38", "fasta", None, true).unwrap_err();

        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(err, GenoregError::Permission(_)));
        assert_eq!(server.calls.get(), 0, "no network call before the check");
    }
}
