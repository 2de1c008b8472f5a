use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::NodeType;

/// Free-form fields extracted alongside a mention (year, email, ...).
pub type Attributes = BTreeMap<String, serde_json::Value>;

const NODE_NAMESPACE: Uuid = Uuid::from_u128(0x6d0f_3c4e_9a51_4b8e_a2d7_1f60_c3b9_58e4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Derives the id from the node's creation sequence number and identity,
    /// so replaying the same input yields the same ids.
    #[must_use]
    pub fn derive(sequence: usize, node_type: NodeType, simplified_name: &str) -> Self {
        let name = format!("{sequence}/{node_type}/{simplified_name}");
        Self(Uuid::new_v5(&NODE_NAMESPACE, name.as_bytes()))
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub attributes: Attributes,
    /// Documents in which this entity was mentioned.
    pub mentioned_in: BTreeSet<String>,
    /// Types observed for this entity that differ from `node_type`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub conflicting_types: BTreeSet<NodeType>,
}

impl Node {
    #[must_use]
    pub fn new(id: NodeId, node_type: NodeType, canonical_name: String) -> Self {
        Self {
            id,
            node_type,
            canonical_name,
            aliases: Vec::new(),
            attributes: Attributes::new(),
            mentioned_in: BTreeSet::new(),
            conflicting_types: BTreeSet::new(),
        }
    }

    /// Returns `true` if the alias was not already recorded.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        if self.aliases.iter().any(|a| a == alias) {
            return false;
        }
        self.aliases.push(alias.to_string());
        true
    }

    pub fn add_mention(&mut self, document_id: &str) -> bool {
        self.mentioned_in.insert(document_id.to_string())
    }

    /// Records a type observation. The first assigned type never changes;
    /// returns `true` when the observation conflicts with it.
    pub fn observe_type(&mut self, observed: NodeType) -> bool {
        if observed == self.node_type {
            return false;
        }
        self.conflicting_types.insert(observed);
        true
    }

    /// Adds incoming attributes. Missing or empty values are filled in,
    /// existing non-empty values are kept. Returns the keys whose incoming
    /// value disagreed with the kept one.
    pub fn merge_attributes(&mut self, incoming: &Attributes) -> Vec<String> {
        let mut disagreements = Vec::new();

        for (key, value) in incoming {
            if is_empty_value(value) {
                continue;
            }
            match self.attributes.get(key) {
                Some(existing) if !is_empty_value(existing) => {
                    if existing != value {
                        disagreements.push(key.clone());
                    }
                }
                _ => {
                    self.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        disagreements
    }

    #[must_use]
    pub fn has_type_conflict(&self) -> bool {
        !self.conflicting_types.is_empty()
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn faculty() -> Node {
        let id = NodeId::derive(0, NodeType::Faculty, "a sharma");
        Node::new(id, NodeType::Faculty, "A. Sharma".into())
    }

    #[test]
    fn test_node_id_is_deterministic() {
        let a = NodeId::derive(3, NodeType::Faculty, "a sharma");
        let b = NodeId::derive(3, NodeType::Faculty, "a sharma");
        let c = NodeId::derive(4, NodeType::Faculty, "a sharma");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_aliases_are_append_only_and_unique() {
        let mut node = faculty();

        assert!(node.add_alias("Dr. A. Sharma"));
        assert!(node.add_alias("A Sharma"));
        assert!(!node.add_alias("Dr. A. Sharma"));

        assert_eq!(node.aliases, vec!["Dr. A. Sharma", "A Sharma"]);
    }

    #[test]
    fn test_first_type_wins() {
        let mut node = faculty();

        assert!(!node.observe_type(NodeType::Faculty));
        assert!(node.observe_type(NodeType::PostDoc));

        assert_eq!(node.node_type, NodeType::Faculty);
        assert!(node.has_type_conflict());
    }

    #[test]
    fn test_attribute_merge_never_overwrites_with_empty() {
        let mut node = faculty();

        let first: Attributes = [
            ("email".to_string(), json!("sharma@example.edu")),
            ("year".to_string(), json!("")),
        ]
        .into_iter()
        .collect();
        assert!(node.merge_attributes(&first).is_empty());
        assert!(!node.attributes.contains_key("year"));

        let second: Attributes = [
            ("email".to_string(), json!("")),
            ("year".to_string(), json!(2019)),
        ]
        .into_iter()
        .collect();
        assert!(node.merge_attributes(&second).is_empty());

        let third: Attributes = [("email".to_string(), json!("other@example.edu"))]
            .into_iter()
            .collect();
        assert_eq!(node.merge_attributes(&third), vec!["email"]);

        assert_eq!(node.attributes["email"], json!("sharma@example.edu"));
        assert_eq!(node.attributes["year"], json!(2019));
    }
}
