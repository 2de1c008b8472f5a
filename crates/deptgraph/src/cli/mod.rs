pub mod assemble;
pub mod output;
pub mod responses;
pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use deptgraph_core::EngineConfig;

#[derive(Parser)]
#[command(
    name = "dgraph",
    about = "Assemble a department knowledge graph from extracted triples",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble candidate triples from a JSON file
    Assemble {
        /// Input file: a list of documents, a list of `{id: candidates}` maps, or one such map
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Replay stored model replies, one file per document
    Responses {
        /// Directory of reply files; each file stem is a document id
        dir: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the legal (source, relation, target) combinations
    Schema,
}

#[derive(clap::Args)]
pub struct OutputArgs {
    /// Write the graph here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write the extraction report here
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Also write nodes.csv and edges.csv into this directory
    #[arg(long, value_name = "DIR")]
    pub csv: Option<PathBuf>,
    /// Engine configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Configuration file if given, otherwise defaults, then `DEPTGRAPH_*`
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}
