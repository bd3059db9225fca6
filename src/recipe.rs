//! Build recipe catalog
//!
//! An [`AssetRecipe`] is a declarative, read-only specification of how one
//! asset type is produced: the raw inputs the caller must supply, the parent
//! assets that must already be registered, and the shell command templates
//! to run. Templates are validated when the catalog is constructed, so a
//! command referencing an undeclared placeholder fails at load time rather
//! than at render time.
//!
//! Placeholders available to a recipe's commands:
//!
//! - builtins: `{genome}`, `{asset}`, `{tag}`, `{asset_outfolder}`,
//!   `{genome_outfolder}`
//! - one per declared raw input, named after the input
//! - one per declared parent asset, named after the parent, resolving to the
//!   parent's registered output path

use crate::error::{GenoregError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholders every recipe may use without declaring them.
pub const BUILTIN_PLACEHOLDERS: &[&str] = &[
    "genome",
    "asset",
    "tag",
    "asset_outfolder",
    "genome_outfolder",
];

/// A shell command with `{placeholder}` interpolation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    /// Wrap a raw template string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of all `{placeholder}` occurrences in the template.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            rest = &rest[open + 1..];
            if let Some(close) = rest.find('}') {
                names.push(&rest[..close]);
                rest = &rest[close + 1..];
            } else {
                break;
            }
        }
        names
    }

    /// Render the template against resolved variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipe` naming the first unresolved placeholder.
    /// Catalog validation makes this unreachable for builtin recipes.
    pub fn render(&self, recipe: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        let mut out = self.0.clone();
        for name in self.placeholders() {
            let value = vars.get(name).ok_or_else(|| GenoregError::InvalidRecipe {
                recipe: recipe.to_string(),
                placeholder: name.to_string(),
            })?;
            out = out.replace(&format!("{{{name}}}"), value);
        }
        Ok(out)
    }
}

/// Declarative build specification for one asset type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecipe {
    /// Asset type name; the catalog lookup key.
    pub name: String,
    /// Human-readable description, recorded on built assets.
    pub description: String,
    /// Raw inputs the caller must supply (`--input name=path`).
    pub required_inputs: Vec<String>,
    /// Parent assets, each `asset[:tag]`, that must already be registered.
    pub required_assets: Vec<String>,
    /// Container image to run under when containerized execution is requested.
    pub container_image: Option<String>,
    /// Shell command templates, run in order.
    pub commands: Vec<CommandTemplate>,
    /// Seek keys for the recipe's outputs: name to path template relative to
    /// the asset output folder.
    pub output_seek_keys: BTreeMap<String, String>,
}

impl AssetRecipe {
    /// Validate that every command placeholder is a builtin, a declared
    /// input, or a declared parent asset, and that seek-key templates use
    /// builtins only.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipe` naming the first undeclared placeholder.
    pub fn validate(&self) -> Result<()> {
        let mut allowed: Vec<&str> = BUILTIN_PLACEHOLDERS.to_vec();
        allowed.extend(self.required_inputs.iter().map(String::as_str));
        allowed.extend(
            self.required_assets
                .iter()
                .map(|spec| parse_parent_spec(spec).0),
        );

        for command in &self.commands {
            for name in command.placeholders() {
                if !allowed.contains(&name) {
                    return Err(GenoregError::InvalidRecipe {
                        recipe: self.name.clone(),
                        placeholder: name.to_string(),
                    });
                }
            }
        }
        for template in self.output_seek_keys.values() {
            for name in CommandTemplate::new(template.clone()).placeholders() {
                if !BUILTIN_PLACEHOLDERS.contains(&name) {
                    return Err(GenoregError::InvalidRecipe {
                        recipe: self.name.clone(),
                        placeholder: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Split a parent spec `asset[:tag]` into asset name and optional tag.
#[must_use]
pub fn parse_parent_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once(':') {
        Some((asset, tag)) => (asset, Some(tag)),
        None => (spec, None),
    }
}

/// Static table of asset-type build specifications.
#[derive(Debug, Clone)]
pub struct RecipeCatalog {
    recipes: BTreeMap<String, AssetRecipe>,
}

impl RecipeCatalog {
    /// Build the catalog of builtin recipes, validating every template.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipe` if any builtin template references an
    /// undeclared placeholder.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self {
            recipes: BTreeMap::new(),
        };
        for recipe in builtin_recipes() {
            catalog.insert(recipe)?;
        }
        Ok(catalog)
    }

    /// Insert a recipe after validating it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipe` if validation fails.
    pub fn insert(&mut self, recipe: AssetRecipe) -> Result<()> {
        recipe.validate()?;
        self.recipes.insert(recipe.name.clone(), recipe);
        Ok(())
    }

    /// Exact-match lookup by asset name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AssetRecipe> {
        self.recipes.get(name)
    }

    /// All recipe names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.recipes.keys().map(String::as_str).collect()
    }
}

const TOOLS_IMAGE: &str = "genoreg/biotools";

fn builtin_recipes() -> Vec<AssetRecipe> {
    let image = Some(TOOLS_IMAGE.to_string());

    vec![
        AssetRecipe {
            name: "fasta".to_string(),
            description: "Reference sequence collection with index and chromosome sizes"
                .to_string(),
            required_inputs: vec!["fasta".to_string()],
            required_assets: vec![],
            container_image: image.clone(),
            commands: vec![
                // Gzipped input is decompressed; plain input is copied.
                CommandTemplate::new(
                    "if gzip -t {fasta} 2>/dev/null; then gzip -cd {fasta} > {asset_outfolder}/{genome}.fa; else cp {fasta} {asset_outfolder}/{genome}.fa; fi",
                ),
                CommandTemplate::new("samtools faidx {asset_outfolder}/{genome}.fa"),
                CommandTemplate::new(
                    "cut -f 1,2 {asset_outfolder}/{genome}.fa.fai > {asset_outfolder}/{genome}.chrom.sizes",
                ),
            ],
            output_seek_keys: BTreeMap::from([
                ("fasta".to_string(), "{genome}.fa".to_string()),
                ("fai".to_string(), "{genome}.fa.fai".to_string()),
                ("chrom_sizes".to_string(), "{genome}.chrom.sizes".to_string()),
            ]),
        },
        AssetRecipe {
            name: "bowtie2_index".to_string(),
            description: "Genome index for bowtie2".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![CommandTemplate::new(
                "bowtie2-build {fasta} {asset_outfolder}/{genome}",
            )],
            output_seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
        },
        AssetRecipe {
            name: "hisat2_index".to_string(),
            description: "Genome index for hisat2".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![CommandTemplate::new(
                "hisat2-build {fasta} {asset_outfolder}/{genome}",
            )],
            output_seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
        },
        AssetRecipe {
            name: "bwa_index".to_string(),
            description: "Genome index for bwa".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![
                CommandTemplate::new("ln -sf {fasta} {asset_outfolder}/{genome}.fa"),
                CommandTemplate::new("bwa index {asset_outfolder}/{genome}.fa"),
            ],
            output_seek_keys: BTreeMap::from([(
                "fasta".to_string(),
                "{genome}.fa".to_string(),
            )]),
        },
        AssetRecipe {
            name: "bismark_bt2_index".to_string(),
            description: "Bisulfite genome index for bismark with bowtie2".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![
                CommandTemplate::new("ln -sf {fasta} {asset_outfolder}/"),
                CommandTemplate::new("bismark_genome_preparation --bowtie2 {asset_outfolder}"),
            ],
            output_seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
        },
        AssetRecipe {
            name: "bismark_bt1_index".to_string(),
            description: "Bisulfite genome index for bismark with bowtie1".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![
                CommandTemplate::new("ln -sf {fasta} {asset_outfolder}/"),
                CommandTemplate::new("bismark_genome_preparation {asset_outfolder}"),
            ],
            output_seek_keys: BTreeMap::from([(".".to_string(), ".".to_string())]),
        },
        AssetRecipe {
            name: "epilog_index".to_string(),
            description: "CpG methylation index for epilog".to_string(),
            required_inputs: vec![],
            required_assets: vec!["fasta".to_string()],
            container_image: image.clone(),
            commands: vec![CommandTemplate::new(
                "epilog_indexer -i {fasta} -o {asset_outfolder}/{genome}_cg.tsv -s CG -t",
            )],
            output_seek_keys: BTreeMap::from([(
                "index".to_string(),
                "{genome}_cg.tsv".to_string(),
            )]),
        },
        AssetRecipe {
            name: "kallisto_index".to_string(),
            description: "Transcriptome index for kallisto".to_string(),
            required_inputs: vec!["fasta".to_string()],
            required_assets: vec![],
            container_image: image.clone(),
            commands: vec![CommandTemplate::new(
                "kallisto index -i {asset_outfolder}/{genome}_kallisto_index.idx {fasta}",
            )],
            output_seek_keys: BTreeMap::from([(
                "index".to_string(),
                "{genome}_kallisto_index.idx".to_string(),
            )]),
        },
        AssetRecipe {
            name: "gtf_annotation".to_string(),
            description: "GTF gene annotation".to_string(),
            required_inputs: vec!["gtf".to_string()],
            required_assets: vec![],
            container_image: None,
            commands: vec![CommandTemplate::new(
                "cp {gtf} {asset_outfolder}/{genome}.gtf",
            )],
            output_seek_keys: BTreeMap::from([(
                "gtf".to_string(),
                "{genome}.gtf".to_string(),
            )]),
        },
    ]
}
