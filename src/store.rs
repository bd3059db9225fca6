//! Registry store: a strongly typed tree of genomes, assets and tags.
//!
//! The store is an in-memory mirror of one YAML file. Mutators only touch
//! the in-memory tree; nothing reaches disk until [`RegistryStore::write`],
//! which serializes atomically via temp-file+rename. `write()` is always the
//! last step of a successful mutation, so an interruption before it simply
//! loses the staged change on next load.
//!
//! The store implements no locking; at-most-one-writer safety is the
//! caller's responsibility.

use crate::error::{GenoregError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Marker file whose presence means an asset bundle finished building.
pub const COMPLETE_MARKER: &str = "_genoreg_complete.flag";

/// Deterministic fallback tag for assets that have never been tagged.
pub const DEFAULT_TAG: &str = "default";

/// Registry file name inside the genome folder.
pub const REGISTRY_FILE: &str = "genoreg.yaml";

/// Parent/child dependency edges for one tagged asset version.
///
/// Entries are `asset:tag` strings; the lists are kept symmetric with the
/// named relatives by [`RegistryStore::link_relatives`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relatives {
    /// Tagged assets this version was built from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    /// Tagged assets built from this version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

/// One tagged version of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Bundle directory, relative to the genome folder.
    pub path: PathBuf,
    /// Named sub-paths within the bundle; `"."` means the whole bundle.
    #[serde(default)]
    pub seek_keys: BTreeMap<String, String>,
    /// Directory digest of the bundle at registration time.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Dependency edges to other tagged asset versions.
    #[serde(default)]
    pub relatives: Relatives,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

/// All tagged versions of one asset, plus its default-tag pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Tag resolved when an address names no tag. Always names an existing
    /// tag when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tag: Option<String>,
    /// Description from the recipe or import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tagged versions, keyed by tag. Tag uniqueness within the asset is
    /// structural.
    #[serde(default)]
    pub tags: BTreeMap<String, AssetRecord>,
}

/// One genome: identity checksums plus its assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeRecord {
    /// Collection checksum set at first fasta ingestion; never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_checksum: Option<String>,
    /// Per-sequence digest side table, persisted verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sequence_digests: BTreeMap<String, String>,
    /// Genome directory, relative to the genome folder.
    pub folder: PathBuf,
    /// Assets under this genome.
    #[serde(default)]
    pub assets: BTreeMap<String, AssetEntry>,
}

/// How far a metadata removal cascaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovedScope {
    /// Nothing was registered under the requested key.
    Nothing,
    /// The tag was removed; other tags remain.
    Tag,
    /// The tag was the asset's last; the asset entry was removed too.
    Asset,
    /// The asset was the genome's last; the genome entry was removed too.
    Genome,
}

/// The persistent registry: in-memory tree mirroring one YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStore {
    /// Folder under which all genome directories live.
    pub genome_folder: PathBuf,
    /// Registered genomes.
    #[serde(default)]
    pub genomes: BTreeMap<String, GenomeRecord>,
    #[serde(skip)]
    file_path: PathBuf,
}

impl RegistryStore {
    /// Open the registry under `genome_folder`, loading the registry file
    /// if present and creating the folder otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the registry
    /// file cannot be parsed.
    pub fn open(genome_folder: &Path) -> Result<Self> {
        fs::create_dir_all(genome_folder)?;
        let file_path = genome_folder.join(REGISTRY_FILE);
        if file_path.exists() {
            let text = fs::read_to_string(&file_path)?;
            let mut store: Self = serde_yaml_ng::from_str(&text)?;
            store.file_path = file_path;
            Ok(store)
        } else {
            Ok(Self {
                genome_folder: genome_folder.to_path_buf(),
                genomes: BTreeMap::new(),
                file_path,
            })
        }
    }

    /// Persist the in-memory tree. Atomic via temp-file+rename.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the filesystem write fails.
    pub fn write(&self) -> Result<()> {
        let text = serde_yaml_ng::to_string(self)?;
        let temp = self.file_path.with_extension("yaml.tmp");
        fs::write(&temp, text)?;
        fs::rename(&temp, &self.file_path)?;
        Ok(())
    }

    /// Path of the registry file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Absolute bundle directory for a tagged asset, whether or not it is
    /// registered yet.
    #[must_use]
    pub fn tag_dir(&self, genome: &str, asset: &str, tag: &str) -> PathBuf {
        self.genome_folder.join(genome).join(asset).join(tag)
    }

    /// Look up a genome record.
    #[must_use]
    pub fn genome(&self, genome: &str) -> Option<&GenomeRecord> {
        self.genomes.get(genome)
    }

    /// Look up an asset entry.
    #[must_use]
    pub fn asset(&self, genome: &str, asset: &str) -> Option<&AssetEntry> {
        self.genomes.get(genome)?.assets.get(asset)
    }

    /// Look up one tagged asset record.
    #[must_use]
    pub fn tag_record(&self, genome: &str, asset: &str, tag: &str) -> Option<&AssetRecord> {
        self.asset(genome, asset)?.tags.get(tag)
    }

    /// Initialize a genome's identity from a sequence-collection digest.
    ///
    /// The collection checksum is set exactly once; a later call with a
    /// different checksum fails before any mutation. Re-initialization with
    /// the identical checksum refreshes the per-sequence side table.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` when the genome already has a different
    /// recorded collection checksum.
    pub fn init_genome(
        &mut self,
        genome: &str,
        collection_checksum: &str,
        sequence_digests: BTreeMap<String, String>,
    ) -> Result<()> {
        if let Some(record) = self.genomes.get(genome) {
            if let Some(ref existing) = record.collection_checksum {
                if existing != collection_checksum {
                    return Err(GenoregError::ChecksumMismatch {
                        genome: genome.to_string(),
                        expected: existing.clone(),
                        actual: collection_checksum.to_string(),
                    });
                }
            }
        }
        let record = self.ensure_genome(genome);
        record.collection_checksum = Some(collection_checksum.to_string());
        record.sequence_digests = sequence_digests;
        Ok(())
    }

    /// Get or create the genome record.
    pub fn ensure_genome(&mut self, genome: &str) -> &mut GenomeRecord {
        self.genomes
            .entry(genome.to_string())
            .or_insert_with(|| GenomeRecord {
                folder: PathBuf::from(genome),
                ..GenomeRecord::default()
            })
    }

    /// Stage a tagged asset record, creating genome and asset entries as
    /// needed.
    pub fn update_tag(
        &mut self,
        genome: &str,
        asset: &str,
        tag: &str,
        record: AssetRecord,
        description: Option<&str>,
    ) {
        let entry = self
            .ensure_genome(genome)
            .assets
            .entry(asset.to_string())
            .or_default();
        if let Some(description) = description {
            entry.description = Some(description.to_string());
        }
        entry.tags.insert(tag.to_string(), record);
    }

    /// Point the asset's default tag at `tag`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag is not registered; the pointer must
    /// always name an existing tag.
    pub fn set_default_pointer(&mut self, genome: &str, asset: &str, tag: &str) -> Result<()> {
        let entry = self
            .genomes
            .get_mut(genome)
            .and_then(|g| g.assets.get_mut(asset))
            .ok_or_else(|| GenoregError::NotFound {
                genome: genome.to_string(),
                asset: asset.to_string(),
                tag: tag.to_string(),
            })?;
        if !entry.tags.contains_key(tag) {
            return Err(GenoregError::NotFound {
                genome: genome.to_string(),
                asset: asset.to_string(),
                tag: tag.to_string(),
            });
        }
        entry.default_tag = Some(tag.to_string());
        Ok(())
    }

    /// Resolve the asset's default tag.
    ///
    /// With `use_existing`, an asset with no recorded pointer is an error.
    /// Otherwise the deterministic fallback label for a new build target is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when `use_existing` is set and no pointer exists.
    pub fn default_tag(&self, genome: &str, asset: &str, use_existing: bool) -> Result<String> {
        let recorded = self
            .asset(genome, asset)
            .and_then(|entry| entry.default_tag.clone());
        match recorded {
            Some(tag) => Ok(tag),
            None if use_existing => Err(GenoregError::NotFound {
                genome: genome.to_string(),
                asset: asset.to_string(),
                tag: DEFAULT_TAG.to_string(),
            }),
            None => Ok(DEFAULT_TAG.to_string()),
        }
    }

    /// Resolve a tagged asset to a filesystem path.
    ///
    /// `tag` defaults through the default-tag pointer; `seek_key` defaults
    /// to `"."`, whose registered value `"."` resolves to the bundle
    /// directory itself.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unregistered genome/asset/tag and
    /// `MissingSeekKey` for an unregistered seek key.
    pub fn get_asset(
        &self,
        genome: &str,
        asset: &str,
        tag: Option<&str>,
        seek_key: Option<&str>,
    ) -> Result<PathBuf> {
        let tag = match tag {
            Some(tag) => tag.to_string(),
            None => self.default_tag(genome, asset, true)?,
        };
        let record =
            self.tag_record(genome, asset, &tag)
                .ok_or_else(|| GenoregError::NotFound {
                    genome: genome.to_string(),
                    asset: asset.to_string(),
                    tag: tag.clone(),
                })?;
        let base = self.genome_folder.join(&record.path);
        let seek_key = seek_key.unwrap_or(".");
        let sub = record.seek_keys.get(seek_key).ok_or_else(|| {
            GenoregError::MissingSeekKey {
                genome: genome.to_string(),
                asset: asset.to_string(),
                tag: tag.clone(),
                seek_key: seek_key.to_string(),
            }
        })?;
        if sub == "." {
            Ok(base)
        } else {
            Ok(base.join(sub))
        }
    }

    /// Record a symmetric parent/child edge between two tagged versions.
    pub fn link_relatives(
        &mut self,
        genome: &str,
        child_asset: &str,
        child_tag: &str,
        parent_asset: &str,
        parent_tag: &str,
    ) {
        let parent_ref = format!("{parent_asset}:{parent_tag}");
        let child_ref = format!("{child_asset}:{child_tag}");

        if let Some(record) = self
            .genomes
            .get_mut(genome)
            .and_then(|g| g.assets.get_mut(child_asset))
            .and_then(|a| a.tags.get_mut(child_tag))
        {
            if !record.relatives.parents.contains(&parent_ref) {
                record.relatives.parents.push(parent_ref);
            }
        }
        if let Some(record) = self
            .genomes
            .get_mut(genome)
            .and_then(|g| g.assets.get_mut(parent_asset))
            .and_then(|a| a.tags.get_mut(parent_tag))
        {
            if !record.relatives.children.contains(&child_ref) {
                record.relatives.children.push(child_ref);
            }
        }
    }

    /// Rename a tag in store metadata only.
    ///
    /// Returns `false` (no-op) when the source tag is absent. The default
    /// pointer follows the rename when it named the old tag, and every
    /// linked relative's edge to `asset:old_tag` is rewritten so the
    /// parent/child lists stay symmetric. The corresponding directory
    /// rename is the lifecycle layer's job and is not atomic with this
    /// mutation.
    pub fn tag_asset(&mut self, genome: &str, asset: &str, old_tag: &str, new_tag: &str) -> bool {
        let Some(entry) = self
            .genomes
            .get_mut(genome)
            .and_then(|g| g.assets.get_mut(asset))
        else {
            return false;
        };
        let Some(mut record) = entry.tags.remove(old_tag) else {
            return false;
        };
        record.path = PathBuf::from(genome).join(asset).join(new_tag);
        let relatives = record.relatives.clone();
        entry.tags.insert(new_tag.to_string(), record);
        if entry.default_tag.as_deref() == Some(old_tag) {
            entry.default_tag = Some(new_tag.to_string());
        }

        let old_ref = format!("{asset}:{old_tag}");
        let new_ref = format!("{asset}:{new_tag}");
        for parent in &relatives.parents {
            if let Some((parent_asset, parent_tag)) = parent.split_once(':') {
                if let Some(rel) = self.relatives_of_mut(genome, parent_asset, parent_tag) {
                    for edge in &mut rel.children {
                        if *edge == old_ref {
                            *edge = new_ref.clone();
                        }
                    }
                }
            }
        }
        for child in &relatives.children {
            if let Some((child_asset, child_tag)) = child.split_once(':') {
                if let Some(rel) = self.relatives_of_mut(genome, child_asset, child_tag) {
                    for edge in &mut rel.parents {
                        if *edge == old_ref {
                            *edge = new_ref.clone();
                        }
                    }
                }
            }
        }
        true
    }

    fn relatives_of_mut(&mut self, genome: &str, asset: &str, tag: &str) -> Option<&mut Relatives> {
        self.genomes
            .get_mut(genome)?
            .assets
            .get_mut(asset)?
            .tags
            .get_mut(tag)
            .map(|record| &mut record.relatives)
    }

    /// Remove a tagged asset from the registry metadata, cascading upward.
    ///
    /// Removing the asset's last tag removes the asset entry; removing the
    /// genome's last asset removes the genome entry. The removed version's
    /// edges are pruned from surviving relatives. Every step tolerates an
    /// already-missing key. Directory deletion is separate and best-effort.
    pub fn remove_asset(&mut self, genome: &str, asset: &str, tag: &str) -> RemovedScope {
        let Some(genome_record) = self.genomes.get_mut(genome) else {
            return RemovedScope::Nothing;
        };
        let Some(entry) = genome_record.assets.get_mut(asset) else {
            return RemovedScope::Nothing;
        };
        let Some(removed) = entry.tags.remove(tag) else {
            return RemovedScope::Nothing;
        };
        if entry.default_tag.as_deref() == Some(tag) {
            entry.default_tag = entry.tags.keys().next().cloned();
        }
        let scope = if !entry.tags.is_empty() {
            RemovedScope::Tag
        } else {
            genome_record.assets.remove(asset);
            if !genome_record.assets.is_empty() {
                RemovedScope::Asset
            } else {
                self.genomes.remove(genome);
                RemovedScope::Genome
            }
        };

        let self_ref = format!("{asset}:{tag}");
        for parent in &removed.relatives.parents {
            if let Some((parent_asset, parent_tag)) = parent.split_once(':') {
                if let Some(rel) = self.relatives_of_mut(genome, parent_asset, parent_tag) {
                    rel.children.retain(|edge| edge != &self_ref);
                }
            }
        }
        for child in &removed.relatives.children {
            if let Some((child_asset, child_tag)) = child.split_once(':') {
                if let Some(rel) = self.relatives_of_mut(genome, child_asset, child_tag) {
                    rel.parents.retain(|edge| edge != &self_ref);
                }
            }
        }
        scope
    }

    /// Whether the bundle for a tagged asset finished building: the record
    /// exists and its completion marker is on disk.
    #[must_use]
    pub fn is_asset_complete(&self, genome: &str, asset: &str, tag: &str) -> bool {
        match self.tag_record(genome, asset, tag) {
            Some(record) => self
                .genome_folder
                .join(&record.path)
                .join(COMPLETE_MARKER)
                .exists(),
            None => false,
        }
    }
}
