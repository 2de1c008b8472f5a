use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use deptgraph_core::ingest::AssemblyOutput;
use deptgraph_core::GraphExport;

use super::OutputArgs;

/// Writes the graph (stdout unless `-o`), the optional report and CSV files
/// and a one-line summary on stderr.
pub fn write(output: &AssemblyOutput, args: &OutputArgs) -> Result<()> {
    let graph = serde_json::to_string_pretty(&output.graph.export())?;

    match &args.output {
        Some(path) => fs::write(path, graph + "\n")
            .with_context(|| format!("Failed to write graph to {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{graph}")?;
        }
    }

    if let Some(path) = &args.report {
        let report = serde_json::to_string_pretty(&output.report)?;
        fs::write(path, report + "\n")
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if let Some(dir) = &args.csv {
        write_csv(&output.graph.export(), dir)?;
    }

    let summary = output.report.summary();
    let marker = if summary.totals.rejected == 0 {
        style("●").green()
    } else {
        style("●").yellow()
    };
    eprintln!("{marker} {summary}");
    Ok(())
}

/// List fields are joined with `; `; attributes stay a JSON object.
fn write_csv(export: &GraphExport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join("nodes.csv");
    let mut nodes = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    nodes.write_record(["id", "type", "canonicalName", "aliases", "attributes"])?;
    for node in &export.nodes {
        nodes.write_record([
            node.id.to_string(),
            node.node_type.to_string(),
            node.canonical_name.clone(),
            node.aliases.join("; "),
            serde_json::to_string(&node.attributes)?,
        ])?;
    }
    nodes.flush()?;

    let path = dir.join("edges.csv");
    let mut edges = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    edges.write_record(["sourceId", "targetId", "relationType", "provenance"])?;
    for edge in &export.edges {
        edges.write_record([
            edge.source_id.to_string(),
            edge.target_id.to_string(),
            edge.relation_type.to_string(),
            edge.provenance.join("; "),
        ])?;
    }
    edges.flush()?;

    Ok(())
}
