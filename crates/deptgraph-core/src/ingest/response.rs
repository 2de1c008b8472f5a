use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::candidate::{CandidateNode, CandidateTriple, Extraction};

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("No JSON payload in model reply")]
    NoPayload,
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid response pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type ResponseResult<T> = Result<T, ResponseError>;

/// Candidates recovered from one reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub extraction: Extraction,
    /// Records that were neither objects nor arrays.
    pub skipped: usize,
}

/// Turns a language model's raw reply into candidate triples and nodes.
///
/// The payload is taken from a fenced code block (a `json` fence wins over
/// an untagged one), otherwise from the outermost `[...]` or `{...}` span,
/// whichever opens first.
pub struct ResponseParser {
    fence: Regex,
    array: Regex,
    object: Regex,
}

impl ResponseParser {
    pub fn new() -> ResponseResult<Self> {
        Ok(Self {
            fence: Regex::new(r"(?s)```([A-Za-z]*)[ \t]*\r?\n?(.*?)```")?,
            array: Regex::new(r"(?s)\[.*\]")?,
            object: Regex::new(r"(?s)\{.*\}")?,
        })
    }

    pub fn parse(&self, document_id: &str, reply: &str) -> ResponseResult<ParsedResponse> {
        let payload = self.payload(reply)?;
        let mut parsed = interpret(&payload);
        for triple in &mut parsed.extraction.triples {
            triple.document_id = document_id.to_string();
        }
        tracing::debug!(
            document = document_id,
            nodes = parsed.extraction.nodes.len(),
            triples = parsed.extraction.triples.len(),
            skipped = parsed.skipped,
            "Parsed model reply"
        );
        Ok(parsed)
    }

    fn payload(&self, reply: &str) -> ResponseResult<Value> {
        let fenced: Vec<(&str, &str)> = self
            .fence
            .captures_iter(reply)
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str().trim())))
            .filter(|(_, body)| !body.is_empty())
            .collect();
        let fenced = fenced
            .iter()
            .find(|(lang, _)| lang.eq_ignore_ascii_case("json"))
            .or_else(|| fenced.first())
            .map(|(_, body)| *body);
        if let Some(body) = fenced {
            return Ok(serde_json::from_str(body)?);
        }

        let mut spans: Vec<regex::Match<'_>> = [&self.array, &self.object]
            .iter()
            .filter_map(|re| re.find(reply))
            .collect();
        spans.sort_by_key(regex::Match::start);

        let mut last_error = None;
        for span in spans {
            match serde_json::from_str(span.as_str()) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.map_or(ResponseError::NoPayload, ResponseError::Json))
    }
}

/// Local node declarations in a reply, keyed by the reply's own ids.
type LocalNodes = HashMap<String, (Option<String>, Option<String>)>;

fn interpret(payload: &Value) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();
    let mut local = LocalNodes::new();
    let mut pending_edges = Vec::new();

    let records: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if is_container(map) => {
            for node in list(map, "nodes") {
                declare_node(node, &mut parsed, &mut local);
            }
            pending_edges.extend(list(map, "edges"));
            list(map, "triples")
                .into_iter()
                .chain(list(map, "relations"))
                .collect()
        }
        other => vec![other],
    };

    for record in records {
        match record {
            Value::Object(map) if map.get("node").is_some_and(Value::is_object) => {
                if let Some(node) = map.get("node") {
                    declare_node(node, &mut parsed, &mut local);
                }
                pending_edges.extend(list(map, "edges"));
            }
            Value::Object(_) | Value::Array(_) => {
                if let Some(triple) = CandidateTriple::from_value(record) {
                    parsed.extraction.triples.push(triple);
                }
            }
            _ => parsed.skipped += 1,
        }
    }

    // Edges may point at nodes declared later in the reply.
    for edge in pending_edges {
        match edge {
            Value::Object(map) => parsed.extraction.triples.push(edge_triple(map, &local)),
            _ => parsed.skipped += 1,
        }
    }

    parsed
}

fn is_container(map: &Map<String, Value>) -> bool {
    ["nodes", "edges", "triples", "relations"]
        .iter()
        .any(|key| map.get(*key).is_some_and(Value::is_array))
}

fn list<'a>(map: &'a Map<String, Value>, key: &str) -> Vec<&'a Value> {
    match map.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn declare_node(value: &Value, parsed: &mut ParsedResponse, local: &mut LocalNodes) {
    let Some(node) = CandidateNode::from_value(value) else {
        parsed.skipped += 1;
        return;
    };
    if let Some(id) = value.get("id").and_then(scalar) {
        local.insert(id, (node.mention.clone(), node.type_hint.clone()));
    }
    parsed.extraction.nodes.push(node);
}

/// An edge whose endpoints are local ids. An id that was never declared is
/// used as the mention itself, with no type hint.
fn edge_triple(map: &Map<String, Value>, local: &LocalNodes) -> CandidateTriple {
    let endpoint = |keys: &[&str]| {
        let id = keys.iter().find_map(|k| map.get(*k).and_then(scalar))?;
        Some(
            local
                .get(&id)
                .cloned()
                .unwrap_or((Some(id), None)),
        )
    };
    let (source_mention, source_type_hint) = endpoint(&["from", "source"]).unwrap_or_default();
    let (target_mention, target_type_hint) = endpoint(&["to", "target"]).unwrap_or_default();

    CandidateTriple {
        source_mention,
        source_type_hint,
        relation_type: ["relation", "relation_type", "relationType", "type"]
            .iter()
            .find_map(|k| map.get(*k).and_then(scalar)),
        target_mention,
        target_type_hint,
        ..CandidateTriple::default()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
