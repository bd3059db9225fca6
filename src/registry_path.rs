//! Registry path grammar for asset addressing
//!
//! A registry path names an asset (and optionally a sub-path within it) in
//! one string:
//!
//! - `hg38/bowtie2_index` - genome and asset
//! - `hg38/bowtie2_index:1.0.0` - pinned to a tag
//! - `hg38/fasta.chrom_sizes` - a seek key within the asset
//! - `refgenomes://hg38/fasta.fai:default` - full form with protocol
//! - `bowtie2_index` - asset only; the genome comes from the batch argument
//!
//! # Example
//!
//! ```
//! use genoreg::registry_path::RegistryPath;
//!
//! let path = RegistryPath::parse("hg38/bowtie2_index:1.0.0").unwrap();
//! assert_eq!(path.genome.as_deref(), Some("hg38"));
//! assert_eq!(path.asset, "bowtie2_index");
//! assert_eq!(path.tag.as_deref(), Some("1.0.0"));
//! assert!(path.seek_key.is_none());
//! ```

use crate::error::{GenoregError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed registry path: `[protocol://]genome/asset[.seek_key][:tag]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPath {
    /// Optional protocol prefix (e.g. `refgenomes`).
    pub protocol: Option<String>,
    /// Genome name; may be absent and inherited from the batch argument.
    pub genome: Option<String>,
    /// Asset name. Required.
    pub asset: String,
    /// Named sub-path within the asset's outputs.
    pub seek_key: Option<String>,
    /// Version tag.
    pub tag: Option<String>,
}

impl RegistryPath {
    /// Parse a registry path string.
    ///
    /// The asset component is mandatory; every other component is optional.
    ///
    /// # Errors
    ///
    /// Returns `GenoregError::Parse` if the asset is missing or any present
    /// component is empty.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(GenoregError::Parse("empty registry path".to_string()));
        }

        let (protocol, rest) = match input.find("://") {
            Some(idx) => {
                let protocol = &input[..idx];
                if protocol.is_empty() {
                    return Err(GenoregError::Parse(input.to_string()));
                }
                (Some(protocol.to_string()), &input[idx + 3..])
            }
            None => (None, input),
        };

        // Tag is everything after the last ':'.
        let (rest, tag) = match rest.rfind(':') {
            Some(idx) => {
                let tag = &rest[idx + 1..];
                if tag.is_empty() {
                    return Err(GenoregError::Parse(input.to_string()));
                }
                (&rest[..idx], Some(tag.to_string()))
            }
            None => (rest, None),
        };

        // Genome is everything before the first '/'.
        let (genome, asset_part) = match rest.find('/') {
            Some(idx) => {
                let genome = &rest[..idx];
                if genome.is_empty() {
                    return Err(GenoregError::Parse(input.to_string()));
                }
                (Some(genome.to_string()), &rest[idx + 1..])
            }
            None => (None, rest),
        };

        // Seek key is everything after the first '.' of the asset part.
        let (asset, seek_key) = match asset_part.find('.') {
            Some(idx) => {
                let seek = &asset_part[idx + 1..];
                if seek.is_empty() {
                    return Err(GenoregError::Parse(input.to_string()));
                }
                (&asset_part[..idx], Some(seek.to_string()))
            }
            None => (asset_part, None),
        };

        if asset.is_empty() {
            return Err(GenoregError::Parse(format!(
                "missing asset in '{input}'"
            )));
        }

        Ok(Self {
            protocol,
            genome,
            asset: asset.to_string(),
            seek_key,
            tag,
        })
    }

    /// Fill in the genome from a batch-level argument.
    ///
    /// A genome supplied both in the address and as the batch argument must
    /// agree; a path with no genome from either source is a validation error.
    ///
    /// # Errors
    ///
    /// Returns `GenomeMismatch` on disagreement, `Parse` if no genome is
    /// available from either source.
    pub fn resolve_genome(&mut self, batch_genome: Option<&str>) -> Result<()> {
        match (&self.genome, batch_genome) {
            (Some(addressed), Some(batch)) if addressed != batch => {
                Err(GenoregError::GenomeMismatch {
                    address: addressed.clone(),
                    batch: batch.to_string(),
                })
            }
            (Some(_), _) => Ok(()),
            (None, Some(batch)) => {
                self.genome = Some(batch.to_string());
                Ok(())
            }
            (None, None) => Err(GenoregError::Parse(format!(
                "no genome specified for asset '{}'",
                self.asset
            ))),
        }
    }

    /// The genome, after `resolve_genome` has run.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the genome is still unresolved.
    pub fn require_genome(&self) -> Result<&str> {
        self.genome.as_deref().ok_or_else(|| {
            GenoregError::Parse(format!("no genome specified for asset '{}'", self.asset))
        })
    }
}

impl fmt::Display for RegistryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref protocol) = self.protocol {
            write!(f, "{protocol}://")?;
        }
        if let Some(ref genome) = self.genome {
            write!(f, "{genome}/")?;
        }
        write!(f, "{}", self.asset)?;
        if let Some(ref seek_key) = self.seek_key {
            write!(f, ".{seek_key}")?;
        }
        if let Some(ref tag) = self.tag {
            write!(f, ":{tag}")?;
        }
        Ok(())
    }
}

impl FromStr for RegistryPath {
    type Err = GenoregError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genome_asset_tag() {
        let path = RegistryPath::parse("hg38/bowtie2_index:1.0.0").unwrap();
        assert_eq!(path.genome.as_deref(), Some("hg38"));
        assert_eq!(path.asset, "bowtie2_index");
        assert_eq!(path.tag.as_deref(), Some("1.0.0"));
        assert!(path.seek_key.is_none());
        assert!(path.protocol.is_none());
    }

    #[test]
    fn test_parse_seek_key() {
        let path = RegistryPath::parse("hg38/fasta.chrom_sizes").unwrap();
        assert_eq!(path.genome.as_deref(), Some("hg38"));
        assert_eq!(path.asset, "fasta");
        assert_eq!(path.seek_key.as_deref(), Some("chrom_sizes"));
        assert!(path.tag.is_none());
    }

    #[test]
    fn test_parse_full_form() {
        let path = RegistryPath::parse("refgenomes://hg38/fasta.fai:default").unwrap();
        assert_eq!(path.protocol.as_deref(), Some("refgenomes"));
        assert_eq!(path.genome.as_deref(), Some("hg38"));
        assert_eq!(path.asset, "fasta");
        assert_eq!(path.seek_key.as_deref(), Some("fai"));
        assert_eq!(path.tag.as_deref(), Some("default"));
    }

    #[test]
    fn test_parse_asset_only() {
        let path = RegistryPath::parse("bowtie2_index").unwrap();
        assert!(path.genome.is_none());
        assert_eq!(path.asset, "bowtie2_index");
    }

    #[test]
    fn test_parse_asset_with_tag_no_genome() {
        let path = RegistryPath::parse("fasta:0.4").unwrap();
        assert!(path.genome.is_none());
        assert_eq!(path.asset, "fasta");
        assert_eq!(path.tag.as_deref(), Some("0.4"));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(RegistryPath::parse("").is_err());
        assert!(RegistryPath::parse("   ").is_err());
    }

    #[test]
    fn test_parse_missing_asset_is_error() {
        assert!(RegistryPath::parse("hg38/").is_err());
        assert!(RegistryPath::parse("hg38/:1.0.0").is_err());
        assert!(RegistryPath::parse("/fasta").is_err());
    }

    #[test]
    fn test_parse_empty_components_are_errors() {
        assert!(RegistryPath::parse("hg38/fasta:").is_err());
        assert!(RegistryPath::parse("hg38/fasta.").is_err());
        assert!(RegistryPath::parse("://hg38/fasta").is_err());
    }

    #[test]
    fn test_roundtrip() {
        for input in [
            "hg38/bowtie2_index:1.0.0",
            "hg38/fasta.chrom_sizes",
            "refgenomes://hg38/fasta.fai:default",
            "bowtie2_index",
            "fasta:0.4",
            "hg38/fasta",
        ] {
            let path = RegistryPath::parse(input).unwrap();
            assert_eq!(path.to_string(), input, "roundtrip for {input}");
        }
    }

    #[test]
    fn test_roundtrip_preserves_tuple() {
        let a = RegistryPath::parse("hg38/fasta.fai:default").unwrap();
        let b = RegistryPath::parse(&a.to_string()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_genome_inherits_batch() {
        let mut path = RegistryPath::parse("bowtie2_index").unwrap();
        path.resolve_genome(Some("hg38")).unwrap();
        assert_eq!(path.genome.as_deref(), Some("hg38"));
    }

    #[test]
    fn test_resolve_genome_agreement_ok() {
        let mut path = RegistryPath::parse("hg38/bowtie2_index").unwrap();
        path.resolve_genome(Some("hg38")).unwrap();
        assert_eq!(path.genome.as_deref(), Some("hg38"));
    }

    #[test]
    fn test_resolve_genome_disagreement_is_error() {
        let mut path = RegistryPath::parse("hg38/bowtie2_index").unwrap();
        let err = path.resolve_genome(Some("mm10")).unwrap_err();
        assert!(matches!(err, GenoregError::GenomeMismatch { .. }));
    }

    #[test]
    fn test_resolve_genome_missing_everywhere_is_error() {
        let mut path = RegistryPath::parse("bowtie2_index").unwrap();
        assert!(path.resolve_genome(None).is_err());
    }

    #[test]
    fn test_from_str_trait() {
        let path: RegistryPath = "hg38/fasta".parse().unwrap();
        assert_eq!(path.asset, "fasta");
    }
}
