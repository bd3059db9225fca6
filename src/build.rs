//! Dependency-aware build orchestration.
//!
//! Requested assets are processed in caller-given order; the orchestrator
//! performs no topological sort across a batch. Callers building an asset
//! and its parent in one batch must list the parent first. This is a
//! documented precondition, not an inference the orchestrator makes.

use crate::digest::{directory_digest, FastaChecksum};
use crate::error::{GenoregError, Result};
use crate::recipe::{parse_parent_spec, AssetRecipe, RecipeCatalog};
use crate::runner::CommandRunner;
use crate::store::{AssetRecord, RegistryStore, Relatives, COMPLETE_MARKER};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// One build batch: assets to build for a single genome, in order.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Genome every requested asset belongs to.
    pub genome: String,
    /// Requested (asset, explicit tag) pairs, in caller order.
    pub assets: Vec<(String, Option<String>)>,
    /// Raw inputs keyed by recipe input name.
    pub inputs: BTreeMap<String, PathBuf>,
    /// Parent tag overrides keyed by parent asset name.
    pub tag_overrides: BTreeMap<String, String>,
    /// Run recipe commands inside the recipe's container image.
    pub docker: bool,
}

/// What a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// `asset:tag` pairs registered by this batch.
    pub built: Vec<String>,
    /// Asset names skipped because no recipe exists for them.
    pub skipped: Vec<String>,
}

/// Parse a `--tags asset:tag` override. The tag part is mandatory: an
/// override that names a parent without pinning a tag is an error.
///
/// # Errors
///
/// Returns `Parse` when the override has no explicit tag.
pub fn parse_tag_override(spec: &str) -> Result<(String, String)> {
    match spec.split_once(':') {
        Some((asset, tag)) if !asset.is_empty() && !tag.is_empty() => {
            Ok((asset.to_string(), tag.to_string()))
        }
        _ => Err(GenoregError::Parse(format!(
            "tag override '{spec}' must have the form asset:tag"
        ))),
    }
}

/// Drives recipes against the store, runner and checksum collaborators.
pub struct BuildOrchestrator<'a, R: CommandRunner, C: FastaChecksum> {
    store: &'a mut RegistryStore,
    catalog: &'a RecipeCatalog,
    runner: &'a R,
    checksum: &'a C,
}

impl<'a, R: CommandRunner, C: FastaChecksum> BuildOrchestrator<'a, R, C> {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        store: &'a mut RegistryStore,
        catalog: &'a RecipeCatalog,
        runner: &'a R,
        checksum: &'a C,
    ) -> Self {
        Self {
            store,
            catalog,
            runner,
            checksum,
        }
    }

    /// Run a build batch.
    ///
    /// Assets with no recipe are skipped with a warning; every other
    /// failure aborts the batch. Store mutations for each asset are
    /// persisted only after its commands and digest succeed.
    ///
    /// # Errors
    ///
    /// Returns `MissingInput`, `MissingRequirement`, `ChecksumMismatch`,
    /// `CommandFailed` or an IO error; none of these leave a partial write
    /// for the failing asset.
    pub fn run(&mut self, request: &BuildRequest) -> Result<BuildOutcome> {
        let mut outcome = BuildOutcome::default();

        for (asset, explicit_tag) in &request.assets {
            let Some(recipe) = self.catalog.get(asset) else {
                warn!(asset, "no recipe for asset, skipping");
                outcome.skipped.push(asset.clone());
                continue;
            };

            let tag = match explicit_tag {
                Some(tag) => tag.clone(),
                None => self.store.default_tag(&request.genome, asset, false)?,
            };

            info!(genome = %request.genome, asset, tag, "building asset");
            self.build_one(request, recipe, &tag)?;
            outcome.built.push(format!("{asset}:{tag}"));
        }

        Ok(outcome)
    }

    fn build_one(&mut self, request: &BuildRequest, recipe: &AssetRecipe, tag: &str) -> Result<()> {
        let genome = &request.genome;
        let asset = &recipe.name;

        // Every declared raw input must be supplied up front.
        for input in &recipe.required_inputs {
            if !request.inputs.contains_key(input) {
                return Err(GenoregError::MissingInput {
                    asset: asset.clone(),
                    input: input.clone(),
                });
            }
        }

        let parents = self.resolve_parents(request, recipe)?;

        // The fasta primitive fixes the genome's identity before anything
        // runs. A divergent collection checksum aborts with the store
        // untouched on disk.
        if asset == "fasta" {
            let fasta_input = request.inputs.get("fasta").ok_or_else(|| {
                GenoregError::MissingInput {
                    asset: asset.clone(),
                    input: "fasta".to_string(),
                }
            })?;
            let digest = self.checksum.fasta_checksum(fasta_input)?;
            let sequences: BTreeMap<String, String> =
                digest.sequences.iter().cloned().collect();
            self.store
                .init_genome(genome, &digest.collection, sequences)?;
        }

        let genome_outfolder = self.store.genome_folder.join(genome);
        let asset_outfolder = self.store.tag_dir(genome, asset, tag);
        fs::create_dir_all(&asset_outfolder)?;

        let mut vars = BTreeMap::from([
            ("genome".to_string(), genome.clone()),
            ("asset".to_string(), asset.clone()),
            ("tag".to_string(), tag.to_string()),
            (
                "asset_outfolder".to_string(),
                asset_outfolder.display().to_string(),
            ),
            (
                "genome_outfolder".to_string(),
                genome_outfolder.display().to_string(),
            ),
        ]);
        for (name, path) in &request.inputs {
            vars.insert(name.clone(), path.display().to_string());
        }
        for (parent_asset, _, parent_path) in &parents {
            vars.insert(parent_asset.clone(), parent_path.display().to_string());
        }

        let marker = asset_outfolder.join(COMPLETE_MARKER);
        let mut commands = Vec::with_capacity(recipe.commands.len() + 1);
        for template in &recipe.commands {
            commands.push(template.render(asset, &vars)?);
        }
        commands.push(format!("touch {}", marker.display()));

        let container = if request.docker {
            match recipe.container_image {
                Some(ref image) => Some(self.runner.get_container(image, &[genome_outfolder])?),
                None => None,
            }
        } else {
            None
        };

        let run_result = self.runner.run(&commands, &marker, container.as_deref());
        // The container is torn down whether or not the commands succeeded;
        // a failed teardown is logged, not fatal.
        if let Some(ref id) = container {
            if let Err(error) = self.runner.remove_container(id) {
                warn!(container = %id, %error, "could not remove build container");
            }
        }
        run_result?;

        let checksum = directory_digest(&asset_outfolder)?;

        let mut seek_keys = BTreeMap::from([(".".to_string(), ".".to_string())]);
        for (name, template) in &recipe.output_seek_keys {
            seek_keys.insert(
                name.clone(),
                crate::recipe::CommandTemplate::new(template.clone()).render(asset, &vars)?,
            );
        }

        let record = AssetRecord {
            path: PathBuf::from(genome).join(asset).join(tag),
            seek_keys,
            checksum: Some(checksum),
            relatives: Relatives::default(),
            created_at: Utc::now(),
        };
        self.store
            .update_tag(genome, asset, tag, record, Some(&recipe.description));
        self.store.set_default_pointer(genome, asset, tag)?;
        self.store.write()?;

        for (parent_asset, parent_tag, _) in &parents {
            self.store
                .link_relatives(genome, asset, tag, parent_asset, parent_tag);
        }
        if !parents.is_empty() {
            self.store.write()?;
        }

        Ok(())
    }

    /// Resolve each declared parent to (asset, tag, registered path).
    ///
    /// A caller-supplied tag override wins; otherwise the tag pinned in the
    /// parent spec, falling back to the parent's current default tag. A
    /// parent with no registered record under the resolved tag is fatal for
    /// the whole batch.
    fn resolve_parents(
        &self,
        request: &BuildRequest,
        recipe: &AssetRecipe,
    ) -> Result<Vec<(String, String, PathBuf)>> {
        let mut parents = Vec::with_capacity(recipe.required_assets.len());

        for spec in &recipe.required_assets {
            let (parent_asset, spec_tag) = parse_parent_spec(spec);
            let missing = || GenoregError::MissingRequirement {
                asset: recipe.name.clone(),
                requirement: parent_asset.to_string(),
            };

            let parent_tag = match request.tag_overrides.get(parent_asset) {
                Some(tag) => tag.clone(),
                None => match spec_tag {
                    Some(tag) => tag.to_string(),
                    None => self
                        .store
                        .default_tag(&request.genome, parent_asset, true)
                        .map_err(|_| missing())?,
                },
            };

            // Prefer the seek key named after the parent asset (the primary
            // output file), falling back to the whole bundle.
            let parent_path = self
                .store
                .get_asset(
                    &request.genome,
                    parent_asset,
                    Some(&parent_tag),
                    Some(parent_asset),
                )
                .or_else(|_| {
                    self.store
                        .get_asset(&request.genome, parent_asset, Some(&parent_tag), None)
                })
                .map_err(|_| missing())?;

            parents.push((parent_asset.to_string(), parent_tag, parent_path));
        }

        Ok(parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Blake3FastaChecksum;
    use crate::recipe::CommandTemplate;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    /// Touches the target instead of running commands; records container
    /// teardowns.
    struct StubRunner {
        fail: bool,
        removed: RefCell<Vec<String>>,
    }

    impl StubRunner {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                removed: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for StubRunner {
        fn run(&self, _commands: &[String], target: &Path, _container: Option<&str>) -> Result<()> {
            if self.fail {
                return Err(GenoregError::CommandFailed {
                    command: "stub".to_string(),
                    status: 1,
                });
            }
            fs::write(target, b"")?;
            Ok(())
        }

        fn checkprint(&self, _command: &str) -> Result<String> {
            Ok(String::new())
        }

        fn get_container(&self, _image: &str, _volumes: &[PathBuf]) -> Result<String> {
            Ok("stub-container".to_string())
        }

        fn remove_container(&self, container: &str) -> Result<()> {
            self.removed.borrow_mut().push(container.to_string());
            Ok(())
        }
    }

    fn containerized_catalog() -> RecipeCatalog {
        let mut catalog = RecipeCatalog::builtin().unwrap();
        catalog
            .insert(AssetRecipe {
                name: "toy_asset".to_string(),
                description: "toy".to_string(),
                required_inputs: vec![],
                required_assets: vec![],
                container_image: Some("toy/image".to_string()),
                commands: vec![CommandTemplate::new("toytool {asset_outfolder}")],
                output_seek_keys: BTreeMap::new(),
            })
            .unwrap();
        catalog
    }

    fn toy_request() -> BuildRequest {
        BuildRequest {
            genome: "hg38".to_string(),
            assets: vec![("toy_asset".to_string(), None)],
            inputs: BTreeMap::new(),
            tag_overrides: BTreeMap::new(),
            docker: true,
        }
    }

    #[test]
    fn test_container_removed_after_successful_build() {
        let dir = TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let catalog = containerized_catalog();
        let runner = StubRunner::new(false);

        BuildOrchestrator::new(&mut store, &catalog, &runner, &Blake3FastaChecksum)
            .run(&toy_request())
            .unwrap();

        assert_eq!(*runner.removed.borrow(), ["stub-container"]);
        assert!(store.is_asset_complete("hg38", "toy_asset", "default"));
    }

    #[test]
    fn test_container_removed_after_failed_build() {
        let dir = TempDir::new().unwrap();
        let mut store = RegistryStore::open(&dir.path().join("genomes")).unwrap();
        let catalog = containerized_catalog();
        let runner = StubRunner::new(true);

        let err = BuildOrchestrator::new(&mut store, &catalog, &runner, &Blake3FastaChecksum)
            .run(&toy_request())
            .unwrap_err();

        assert!(matches!(err, GenoregError::CommandFailed { .. }));
        assert_eq!(*runner.removed.borrow(), ["stub-container"]);
        // the failed asset was never registered
        assert!(store.tag_record("hg38", "toy_asset", "default").is_none());
    }

    #[test]
    fn test_parse_tag_override() {
        assert_eq!(
            parse_tag_override("fasta:1.0.0").unwrap(),
            ("fasta".to_string(), "1.0.0".to_string())
        );
    }

    #[test]
    fn test_parse_tag_override_requires_explicit_tag() {
        assert!(parse_tag_override("fasta").is_err());
        assert!(parse_tag_override("fasta:").is_err());
        assert!(parse_tag_override(":1.0.0").is_err());
    }
}
