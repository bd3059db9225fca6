//! Content integrity: directory digests and sequence-collection checksums.
//!
//! Directory digests use BLAKE3 over the sorted sequence of
//! (relative path, file content hash) pairs, so the result is deterministic
//! regardless of filesystem traversal order. Sequence checksums digest each
//! FASTA record individually and combine them into a collection digest that
//! identifies the reference as a whole.

use crate::error::Result;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

/// Compute a deterministic digest of a directory tree.
///
/// Each regular file contributes its path relative to `root` (with `/`
/// separators) and the BLAKE3 hash of its content. Pairs are sorted by
/// relative path before the outer hash, so two directories with the same
/// file set always digest identically.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked or a file read.
pub fn directory_digest(root: &Path) -> Result<String> {
    let mut entries: Vec<(String, String)> = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((rel, file_digest(entry.path())?));
    }

    entries.sort();

    let mut hasher = blake3::Hasher::new();
    for (path, digest) in &entries {
        hasher.update(path.as_bytes());
        hasher.update(b"\t");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// BLAKE3 digest of a single file, streamed.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Digest of a FASTA sequence collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaDigest {
    /// Digest identifying the whole collection.
    pub collection: String,
    /// Per-sequence digests in file order.
    pub sequences: Vec<(String, String)>,
}

/// Sequence-checksum collaborator: FASTA path in, collection and
/// per-sequence digests out.
pub trait FastaChecksum {
    /// Compute the collection digest and ordered per-sequence digests for
    /// the FASTA file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn fasta_checksum(&self, path: &Path) -> Result<FastaDigest>;
}

/// BLAKE3-based `FastaChecksum` implementation.
///
/// Sequence content is normalized before hashing: whitespace stripped and
/// bases uppercased, so line wrapping and case do not change identity.
/// Gzipped input (`.gz`) is decompressed transparently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3FastaChecksum;

impl Blake3FastaChecksum {
    fn digest_reader<R: BufRead>(reader: R) -> Result<FastaDigest> {
        let mut sequences: Vec<(String, String)> = Vec::new();
        let mut current: Option<(String, blake3::Hasher)> = None;

        for line in reader.lines() {
            let line = line?;
            if let Some(header) = line.strip_prefix('>') {
                if let Some((name, hasher)) = current.take() {
                    sequences.push((name, hex::encode(hasher.finalize().as_bytes())));
                }
                // Sequence name is the first whitespace-delimited token.
                let name = header
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                current = Some((name, blake3::Hasher::new()));
            } else if let Some((_, ref mut hasher)) = current {
                let normalized: String = line
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_uppercase();
                hasher.update(normalized.as_bytes());
            }
        }
        if let Some((name, hasher)) = current.take() {
            sequences.push((name, hex::encode(hasher.finalize().as_bytes())));
        }

        let mut collection = blake3::Hasher::new();
        for (name, digest) in &sequences {
            collection.update(name.as_bytes());
            collection.update(b"\t");
            collection.update(digest.as_bytes());
            collection.update(b"\n");
        }

        Ok(FastaDigest {
            collection: hex::encode(collection.finalize().as_bytes()),
            sequences,
        })
    }
}

impl FastaChecksum for Blake3FastaChecksum {
    fn fasta_checksum(&self, path: &Path) -> Result<FastaDigest> {
        let file = File::open(path)?;
        let gzipped = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        if gzipped {
            Self::digest_reader(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::digest_reader(BufReader::new(file))
        }
    }
}
