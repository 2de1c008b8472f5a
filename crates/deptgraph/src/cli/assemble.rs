use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use deptgraph_core::ingest::GraphAssembler;
use deptgraph_core::{CandidateNode, CandidateTriple, Extraction, SchemaRegistry};

use super::{load_config, output, OutputArgs};

#[derive(Debug, Deserialize)]
struct DocumentInput {
    #[serde(alias = "documentId", alias = "id")]
    document_id: String,
    #[serde(default)]
    candidates: Vec<Value>,
    #[serde(default)]
    nodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Documents(Vec<DocumentInput>),
    /// `[{"d1": [...]}, {"d2": [...]}]`, ingested in list order.
    Sequence(Vec<BTreeMap<String, Vec<Value>>>),
    /// Document id to candidate list, ingested in id order.
    ById(BTreeMap<String, Vec<Value>>),
}

pub fn run(input: &Path, args: &OutputArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let documents = load(input)?;

    let mut assembler = GraphAssembler::new(SchemaRegistry::standard()?, config.resolver);
    for (document_id, extraction) in documents {
        assembler.ingest_extraction(&document_id, extraction);
    }

    output::write(&assembler.output(), args)
}

fn load(path: &Path) -> Result<Vec<(String, Extraction)>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let input: Input = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a recognised candidate file", path.display()))?;

    let documents = match input {
        Input::Documents(documents) => documents
            .into_iter()
            .map(|doc| {
                let extraction = extraction(&doc.document_id, &doc.candidates, &doc.nodes);
                (doc.document_id, extraction)
            })
            .collect(),
        Input::Sequence(maps) => maps.into_iter().flat_map(by_id).collect(),
        Input::ById(map) => by_id(map).collect(),
    };
    Ok(documents)
}

fn by_id(map: BTreeMap<String, Vec<Value>>) -> impl Iterator<Item = (String, Extraction)> {
    map.into_iter().map(|(id, candidates)| {
        let extraction = extraction(&id, &candidates, &[]);
        (id, extraction)
    })
}

fn extraction(document_id: &str, candidates: &[Value], nodes: &[Value]) -> Extraction {
    let mut extraction = Extraction::new();

    for value in candidates {
        match CandidateTriple::from_value(value) {
            Some(triple) => extraction.triples.push(triple.in_document(document_id)),
            None => warn!(document = document_id, %value, "Skipping unreadable candidate"),
        }
    }
    for value in nodes {
        match CandidateNode::from_value(value) {
            Some(node) => extraction.nodes.push(node),
            None => warn!(document = document_id, %value, "Skipping unreadable node"),
        }
    }

    extraction
}
