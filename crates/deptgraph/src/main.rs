use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deptgraph::cli::{Cli, Commands};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deptgraph=info,deptgraph_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assemble { input, output } => deptgraph::cli::assemble::run(&input, &output),
        Commands::Responses { dir, output } => deptgraph::cli::responses::run(&dir, &output),
        Commands::Schema => deptgraph::cli::schema::run(),
    }
}
