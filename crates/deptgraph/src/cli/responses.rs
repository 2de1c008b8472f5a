use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use deptgraph_core::ingest::{GraphAssembler, IngestPipeline, RecordedExtractor};
use deptgraph_core::SchemaRegistry;

use super::{load_config, output, OutputArgs};

pub fn run(dir: &Path, args: &OutputArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let extractor = RecordedExtractor::from_dir(dir)
        .with_context(|| format!("Failed to load replies from {}", dir.display()))?;
    let documents = extractor.documents();

    let assembler = GraphAssembler::new(SchemaRegistry::standard()?, config.resolver);
    let mut pipeline = IngestPipeline::new(assembler, extractor, config.pipeline);

    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(pipeline.run_prepared(documents));
    info!(
        replies = stats.chunks,
        extracted = stats.extracted,
        failed = stats.failed,
        "Replayed replies"
    );

    output::write(&pipeline.finish(), args)
}
