#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use capsule_config::Manifest;
use capsule_engine::{ArtifactFactory, ArtifactMap, BuildContext, StorageResolverRegistry, Task};

type CliResult = Result<(), Box<dyn Error>>;

const MANIFEST_NAME: &str = "capsule.toml";

#[derive(Debug, Parser)]
#[command(name = "capsule", about = "Resolve build artifacts from component capsules")]
#[command(version)]
struct Cli {
    /// Show debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the artifacts of every component and print them
    Resolve {
        /// Path to capsule.toml (defaults to the current directory)
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Name of the task that produced the files
        #[arg(long, default_value = "build")]
        task: String,
        /// Id of the aspect that registered the task
        #[arg(long, default_value = "capsule.cli")]
        aspect: String,
        /// Print the artifact map as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// List the artifact definitions declared in capsule.toml
    Definitions {
        /// Path to capsule.toml (defaults to the current directory)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Resolve {
            manifest,
            task,
            aspect,
            json,
        } => cmd_resolve(manifest, task, &aspect, json),
        Command::Definitions { manifest } => cmd_definitions(manifest),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Locate the manifest: the given path, or `capsule.toml` in the current directory.
fn manifest_path(manifest: Option<PathBuf>) -> Result<PathBuf, Box<dyn Error>> {
    let path = match manifest {
        Some(path) => path,
        None => std::env::current_dir()?.join(MANIFEST_NAME),
    };
    if !path.exists() {
        return Err(format!("no {MANIFEST_NAME} found at {}", path.display()).into());
    }
    Ok(path)
}

/// Load the manifest and build a context with capsule paths relative to it.
fn load(path: &Path) -> Result<(Manifest, BuildContext), Box<dyn Error>> {
    let manifest = Manifest::from_path(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let layout = manifest.capsules.resolved_against(base);
    let context = BuildContext::from_layout(&layout);
    Ok((manifest, context))
}

fn cmd_resolve(manifest: Option<PathBuf>, task: String, aspect: &str, json: bool) -> CliResult {
    let path = manifest_path(manifest)?;
    let (manifest, context) = load(&path)?;

    eprintln!(
        "    Resolving {} artifact definition(s) for {} component(s)",
        manifest.artifacts.len(),
        context.components().len()
    );

    let factory = ArtifactFactory::new(StorageResolverRegistry::new());
    let task = Arc::new(Task::new(task));
    let map = factory.generate(&context, &manifest.artifacts, &task, aspect)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report(&map))?);
    } else {
        print_map(&map);
    }

    eprintln!(
        "    Finished {} artifact(s) across {} component(s)",
        map.total_artifacts(),
        map.len()
    );
    Ok(())
}

fn cmd_definitions(manifest: Option<PathBuf>) -> CliResult {
    let path = manifest_path(manifest)?;
    let manifest = Manifest::from_path(&path)?;

    if manifest.artifacts.is_empty() {
        eprintln!("No artifact definitions in {}", path.display());
        return Ok(());
    }

    for def in &manifest.artifacts {
        let resolver = def.storage_resolver.as_deref().unwrap_or("default");
        println!("{} ({}, storage: {resolver})", def.name, def.context);
        if let Some(description) = &def.description {
            println!("  {description}");
        }
        if let Some(root_dir) = &def.root_dir {
            println!("  root: {}", root_dir.display());
        }
        for pattern in def.flat_patterns() {
            println!("  - {pattern}");
        }
    }
    Ok(())
}

fn print_map(map: &ArtifactMap) {
    for (id, artifacts) in map {
        if artifacts.is_empty() {
            println!("{id}: no artifacts");
            continue;
        }
        println!("{id}:");
        for artifact in artifacts {
            println!(
                "  {} [{}] in {}",
                artifact.name(),
                artifact.storage_resolver().name(),
                artifact.root_dir().display()
            );
            for file in artifact.files() {
                println!("    {}", file.display());
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ComponentReport {
    component: String,
    artifacts: Vec<ArtifactReport>,
}

#[derive(Debug, Serialize)]
struct ArtifactReport {
    name: String,
    storage_resolver: String,
    root_dir: PathBuf,
    files: Vec<PathBuf>,
}

fn report(map: &ArtifactMap) -> Vec<ComponentReport> {
    map.iter()
        .map(|(id, artifacts)| ComponentReport {
            component: id.to_string(),
            artifacts: artifacts
                .iter()
                .map(|a| ArtifactReport {
                    name: a.name().to_owned(),
                    storage_resolver: a.storage_resolver().name().to_owned(),
                    root_dir: a.root_dir().to_path_buf(),
                    files: a.files().paths().to_vec(),
                })
                .collect(),
        })
        .collect()
}
