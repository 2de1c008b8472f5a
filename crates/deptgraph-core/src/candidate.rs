//! Raw, unvalidated extraction output. Every field may be missing or
//! malformed; nothing here is trusted until it has been normalized,
//! resolved and validated by the assembler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::Attributes;

const SOURCE_FIELDS: &[&str] = &["source", "from", "source_mention", "sourceMention", "subject"];
const SOURCE_TYPE_FIELDS: &[&str] = &[
    "source_type",
    "sourceType",
    "source_type_hint",
    "sourceTypeHint",
    "from_type",
];
const RELATION_FIELDS: &[&str] = &["relation", "relation_type", "relationType", "predicate"];
const TARGET_FIELDS: &[&str] = &["target", "to", "target_mention", "targetMention", "object"];
const TARGET_TYPE_FIELDS: &[&str] = &[
    "target_type",
    "targetType",
    "target_type_hint",
    "targetTypeHint",
    "to_type",
];
const NAME_FIELDS: &[&str] = &["name", "mention", "label"];
const TYPE_FIELDS: &[&str] = &["type", "type_hint", "typeHint"];

/// A proposed `(source, relation, target)` fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct CandidateTriple {
    pub source_mention: Option<String>,
    pub source_type_hint: Option<String>,
    pub relation_type: Option<String>,
    pub target_mention: Option<String>,
    pub target_type_hint: Option<String>,
    pub document_id: String,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub source_attributes: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub target_attributes: Attributes,
}

impl CandidateTriple {
    #[must_use]
    pub fn new(
        source: &str,
        source_type: &str,
        relation: &str,
        target: &str,
        target_type: &str,
    ) -> Self {
        Self {
            source_mention: Some(source.to_string()),
            source_type_hint: Some(source_type.to_string()),
            relation_type: Some(relation.to_string()),
            target_mention: Some(target.to_string()),
            target_type_hint: Some(target_type.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_document(mut self, document_id: &str) -> Self {
        self.document_id = document_id.to_string();
        self
    }

    #[must_use]
    pub fn with_source_attributes(mut self, attributes: Attributes) -> Self {
        self.source_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_target_attributes(mut self, attributes: Attributes) -> Self {
        self.target_attributes = attributes;
        self
    }

    /// Accepts either a record with any of the common field spellings or a
    /// `[source, source_type, relation, target, target_type]` array.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Self {
                source_mention: items.first().and_then(text),
                source_type_hint: items.get(1).and_then(text),
                relation_type: items.get(2).and_then(text),
                target_mention: items.get(3).and_then(text),
                target_type_hint: items.get(4).and_then(text),
                ..Self::default()
            }),
            Value::Object(map) => Some(Self {
                source_mention: field(map, SOURCE_FIELDS),
                source_type_hint: field(map, SOURCE_TYPE_FIELDS),
                relation_type: field(map, RELATION_FIELDS),
                target_mention: field(map, TARGET_FIELDS),
                target_type_hint: field(map, TARGET_TYPE_FIELDS),
                document_id: field(map, &["document_id", "documentId"]).unwrap_or_default(),
                source_attributes: object_field(map, "source_attributes"),
                target_attributes: object_field(map, "target_attributes"),
            }),
            _ => None,
        }
    }
}

impl TryFrom<Value> for CandidateTriple {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value).ok_or_else(|| format!("not a candidate triple: {value}"))
    }
}

impl std::fmt::Display for CandidateTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".into());
        write!(
            f,
            "({}: {}) -[{}]-> ({}: {})",
            show(&self.source_mention),
            show(&self.source_type_hint),
            show(&self.relation_type),
            show(&self.target_mention),
            show(&self.target_type_hint),
        )
    }
}

/// A standalone entity observation that carries no relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct CandidateNode {
    pub mention: Option<String>,
    pub type_hint: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl CandidateNode {
    #[must_use]
    pub fn new(mention: &str, type_hint: &str) -> Self {
        Self {
            mention: Some(mention.to_string()),
            type_hint: Some(type_hint.to_string()),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Fields other than the name, type and local `id` become attributes.
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        let mut attributes = object_field(map, "attributes");
        for (key, value) in map {
            let reserved = key == "id"
                || key == "attributes"
                || NAME_FIELDS.contains(&key.as_str())
                || TYPE_FIELDS.contains(&key.as_str());
            if !reserved {
                attributes.insert(key.clone(), value.clone());
            }
        }

        Some(Self {
            mention: field(map, NAME_FIELDS),
            type_hint: field(map, TYPE_FIELDS),
            attributes,
        })
    }
}

impl TryFrom<Value> for CandidateNode {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value).ok_or_else(|| format!("not a candidate node: {value}"))
    }
}

impl std::fmt::Display for CandidateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}: {})",
            self.mention.as_deref().unwrap_or("?"),
            self.type_hint.as_deref().unwrap_or("?"),
        )
    }
}

/// Everything the extraction collaborator produced for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub nodes: Vec<CandidateNode>,
    #[serde(default)]
    pub triples: Vec<CandidateTriple>,
}

impl Extraction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_triples(triples: Vec<CandidateTriple>) -> Self {
        Self {
            nodes: Vec::new(),
            triples,
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: CandidateNode) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn with_triple(mut self, triple: CandidateTriple) -> Self {
        self.triples.push(triple);
        self
    }

    pub fn merge(&mut self, other: Self) {
        self.nodes.extend(other.nodes);
        self.triples.extend(other.triples);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.triples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.triples.len()
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(map: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| map.get(*name).and_then(text))
}

fn object_field(map: &Map<String, Value>, name: &str) -> Attributes {
    match map.get(name) {
        Some(Value::Object(obj)) => obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_triple_from_array() {
        let value = json!(["Dr. A. Sharma", "Faculty", "heads", "DSE", "Department"]);
        let triple = CandidateTriple::from_value(&value).unwrap();

        assert_eq!(triple, CandidateTriple::new("Dr. A. Sharma", "Faculty", "heads", "DSE", "Department"));
    }

    #[test]
    fn test_triple_from_record_with_alternate_spellings() {
        let value = json!({
            "from": "R. Verma",
            "sourceType": "PhD Scholar",
            "relation_type": "GUIDED_BY",
            "to": "Dr. A. Sharma",
            "target_type": "Faculty",
            "source_attributes": {"year": 2021}
        });
        let triple: CandidateTriple = serde_json::from_value(value).unwrap();

        assert_eq!(triple.source_mention.as_deref(), Some("R. Verma"));
        assert_eq!(triple.source_type_hint.as_deref(), Some("PhD Scholar"));
        assert_eq!(triple.relation_type.as_deref(), Some("GUIDED_BY"));
        assert_eq!(triple.target_mention.as_deref(), Some("Dr. A. Sharma"));
        assert_eq!(triple.source_attributes["year"], json!(2021));
    }

    #[test]
    fn test_missing_and_blank_fields_are_absent() {
        let value = json!({"source": "  ", "relation": "heads", "target": "DSE"});
        let triple = CandidateTriple::from_value(&value).unwrap();

        assert!(triple.source_mention.is_none());
        assert!(triple.source_type_hint.is_none());
        assert_eq!(triple.target_mention.as_deref(), Some("DSE"));

        let short = CandidateTriple::from_value(&json!(["A", "Faculty"])).unwrap();
        assert!(short.relation_type.is_none());

        assert!(CandidateTriple::from_value(&json!("heads")).is_none());
    }

    #[test]
    fn test_candidate_node_collects_attributes() {
        let value = json!({
            "id": "f1",
            "type": "Faculty",
            "name": "Dr. A. Sharma",
            "email": "sharma@example.edu"
        });
        let node = CandidateNode::from_value(&value).unwrap();

        assert_eq!(node.mention.as_deref(), Some("Dr. A. Sharma"));
        assert_eq!(node.type_hint.as_deref(), Some("Faculty"));
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.attributes["email"], json!("sharma@example.edu"));
    }

    #[test]
    fn test_display_marks_missing_fields() {
        let triple = CandidateTriple {
            relation_type: Some("heads".into()),
            ..CandidateTriple::default()
        };

        assert_eq!(triple.to_string(), "(?: ?) -[heads]-> (?: ?)");
    }
}
