use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::schema::RelationType;

/// Identity of an edge. At most one edge exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source_id: NodeId,
    pub relation_type: RelationType,
    pub target_id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relation_type: RelationType,
    /// Documents that produced this edge.
    pub provenance: BTreeSet<String>,
}

impl Edge {
    pub fn new(
        source_id: NodeId,
        target_id: NodeId,
        relation_type: RelationType,
        document_id: &str,
    ) -> crate::Result<Self> {
        if source_id == target_id {
            return Err(crate::Error::SelfReference);
        }

        Ok(Self {
            source_id,
            target_id,
            relation_type,
            provenance: BTreeSet::from([document_id.to_string()]),
        })
    }

    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source_id: self.source_id,
            relation_type: self.relation_type,
            target_id: self.target_id,
        }
    }

    /// Adds a corroborating document. Returns `true` if it was new.
    pub fn corroborate(&mut self, document_id: &str) -> bool {
        self.provenance.insert(document_id.to_string())
    }

    #[must_use]
    pub fn touches(&self, id: NodeId) -> bool {
        self.source_id == id || self.target_id == id
    }
}
