//! genoreg CLI - genome asset registry

use clap::{Parser, Subcommand};
use genoreg::build::{parse_tag_override, BuildRequest};
use genoreg::cli;
use genoreg::error::Result;
use genoreg::ops::{self, RemoveMode, RemoveOutcome};
use genoreg::remote::{HttpAssetServer, DEFAULT_SERVER};
use genoreg::store::RegistryStore;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genoreg")]
#[command(author, version, about = "Genome asset registry", long_about = None)]
struct Cli {
    /// Genomes folder (default: $GENOMES, else ~/.genoreg)
    #[arg(long, global = true)]
    genome_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the registry folder
    Init,
    /// List local genomes, assets and tags
    List,
    /// List genomes and assets available on the asset server
    Avail {
        /// Asset server URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Resolve a registry path to a filesystem path
    Seek {
        /// Registry path (genome/asset[.seek_key][:tag])
        path: String,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
    },
    /// Build assets from recipes
    Build {
        /// Registry paths (asset[:tag]), built in the given order
        paths: Vec<String>,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
        /// Raw inputs, one per recipe requirement (name=path)
        #[arg(long = "input")]
        inputs: Vec<String>,
        /// Parent tag overrides (asset:tag); the tag is mandatory
        #[arg(long = "tags")]
        tag_overrides: Vec<String>,
        /// Run recipe commands in their container image
        #[arg(long)]
        docker: bool,
    },
    /// Import an existing path as a tagged asset
    Add {
        /// Registry path for the new asset
        paths: Vec<String>,
        /// Source file or directory to import
        #[arg(long)]
        path: PathBuf,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
    },
    /// Remove asset bundles
    Remove {
        /// Registry paths to remove
        paths: Vec<String>,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Keep processing the batch after an incomplete bundle
        #[arg(long)]
        keep_going: bool,
    },
    /// Move an asset's current tag to a new name
    Tag {
        /// Registry path of the asset (exactly one)
        paths: Vec<String>,
        /// New tag name
        #[arg(long)]
        to: String,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
    },
    /// Download a built asset from the asset server
    Pull {
        /// Registry path (genome/asset[:tag])
        path: String,
        /// Batch-level genome for addresses without one
        #[arg(long, short)]
        genome: Option<String>,
        /// Asset server URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
        /// Keep the downloaded archive instead of unpacking it
        #[arg(long)]
        no_untar: bool,
    },
}

fn genome_folder(cli: &Cli) -> PathBuf {
    if let Some(ref folder) = cli.genome_folder {
        return folder.clone();
    }
    if let Ok(genomes) = std::env::var("GENOMES") {
        return PathBuf::from(genomes);
    }
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".genoreg"))
        .unwrap_or_else(|_| PathBuf::from(".genoreg"))
}

/// Runs one command; `Ok(false)` means a user-declined confirmation.
fn run(args: &Cli) -> Result<bool> {
    let folder = genome_folder(args);
    let mut store = RegistryStore::open(&folder)?;

    match args.command {
        Commands::Init => {
            store.write()?;
            println!("registry initialized at {}", store.file_path().display());
        }
        Commands::List => {
            print!("{}", cli::format_local_list(&store));
        }
        Commands::Avail { ref server } => {
            let server = HttpAssetServer::new(server.as_str())?;
            print!("{}", cli::format_remote_list(&server)?);
        }
        Commands::Seek {
            ref path,
            ref genome,
        } => {
            let paths = cli::resolve_paths(&[path.clone()], genome.as_deref())?;
            let path = &paths[0];
            let resolved = store.get_asset(
                path.require_genome()?,
                &path.asset,
                path.tag.as_deref(),
                path.seek_key.as_deref(),
            )?;
            println!("{}", resolved.display());
        }
        Commands::Build {
            ref paths,
            ref genome,
            ref inputs,
            ref tag_overrides,
            docker,
        } => {
            let paths = cli::resolve_paths(paths, genome.as_deref())?;
            let genome = match paths.first() {
                Some(first) => first.require_genome()?.to_string(),
                None => {
                    return Err(genoreg::error::GenoregError::Parse(
                        "build requires at least one registry path".to_string(),
                    ))
                }
            };

            let mut input_map = BTreeMap::new();
            for spec in inputs {
                let (name, path) = cli::parse_input_spec(spec)?;
                input_map.insert(name, path);
            }
            let mut override_map = BTreeMap::new();
            for spec in tag_overrides {
                let (asset, tag) = parse_tag_override(spec)?;
                override_map.insert(asset, tag);
            }

            let request = BuildRequest {
                genome,
                assets: paths
                    .iter()
                    .map(|p| (p.asset.clone(), p.tag.clone()))
                    .collect(),
                inputs: input_map,
                tag_overrides: override_map,
                docker,
            };
            let outcome = cli::handle_build(&mut store, &request)?;
            for built in &outcome.built {
                println!("built {built}");
            }
            for skipped in &outcome.skipped {
                println!("skipped {skipped} (no recipe)");
            }
        }
        Commands::Add {
            ref paths,
            ref path,
            ref genome,
        } => {
            let paths = cli::resolve_paths(paths, genome.as_deref())?;
            let target = cli::single_path("add", &paths)?;
            let bundle = ops::add_asset(&mut store, target, path)?;
            println!("added {target} at {}", bundle.display());
        }
        Commands::Remove {
            ref paths,
            ref genome,
            force,
            keep_going,
        } => {
            let paths = cli::resolve_paths(paths, genome.as_deref())?;
            let mode = if keep_going {
                RemoveMode::Lenient
            } else {
                RemoveMode::Strict
            };
            let mut confirm = |prompt: &str| force || cli::confirm_stdin(prompt);
            match ops::remove_assets(&mut store, &paths, mode, &mut confirm)? {
                RemoveOutcome::Removed(count) => println!("removed {count} bundle(s)"),
                RemoveOutcome::Stopped { removed } => {
                    println!("removed {removed} bundle(s); stopped at incomplete bundle");
                }
                RemoveOutcome::Declined => return Ok(false),
            }
        }
        Commands::Tag {
            ref paths,
            ref to,
            ref genome,
        } => {
            let paths = cli::resolve_paths(paths, genome.as_deref())?;
            let target = cli::single_path("tag", &paths)?;
            ops::tag_asset(&mut store, target, to)?;
            println!("tagged {} as {to}", target.asset);
        }
        Commands::Pull {
            ref path,
            ref genome,
            ref server,
            no_untar,
        } => {
            let paths = cli::resolve_paths(&[path.clone()], genome.as_deref())?;
            let target = &paths[0];
            let server = HttpAssetServer::new(server.as_str())?;
            let bundle = ops::pull_asset(
                &mut store,
                &server,
                target.require_genome()?,
                &target.asset,
                target.tag.as_deref(),
                !no_untar,
            )?;
            println!("pulled {target} to {}", bundle.display());
        }
    }

    Ok(true)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("genoreg: {error}");
            ExitCode::FAILURE
        }
    }
}
