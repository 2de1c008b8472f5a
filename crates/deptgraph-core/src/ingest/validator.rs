use crate::candidate::CandidateTriple;
use crate::node::NodeId;
use crate::schema::{NodeType, RelationType, SchemaRegistry};
use crate::{Error, Result};

/// A triple endpoint as it will look once resolution is committed. `id` is
/// `None` for a fresh node that no other endpoint can land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub id: Option<NodeId>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedTriple {
    pub source_type: NodeType,
    pub relation: RelationType,
    pub target_type: NodeType,
}

pub type ValidationResult = Result<ValidatedTriple>;

pub struct RelationValidator<'a> {
    schema: &'a SchemaRegistry,
}

impl<'a> RelationValidator<'a> {
    #[must_use]
    pub fn new(schema: &'a SchemaRegistry) -> Self {
        Self { schema }
    }

    /// Checks, in order: both endpoints resolved, relation known, triple
    /// legal under the schema.
    pub fn validate(
        &self,
        candidate: &CandidateTriple,
        source: Option<&Endpoint>,
        target: Option<&Endpoint>,
    ) -> ValidationResult {
        let source = source.ok_or_else(|| {
            Error::UnresolvedEntity(format!(
                "source {:?} did not resolve",
                candidate.source_mention.as_deref().unwrap_or_default()
            ))
        })?;
        let target = target.ok_or_else(|| {
            Error::UnresolvedEntity(format!(
                "target {:?} did not resolve",
                candidate.target_mention.as_deref().unwrap_or_default()
            ))
        })?;

        let label = candidate
            .relation_type
            .as_deref()
            .ok_or_else(|| Error::UnknownRelation(String::new()))?;
        let relation = self.schema.relation_type(label)?;

        if !self
            .schema
            .is_valid_edge(source.node_type, relation, target.node_type)
        {
            return Err(Error::SchemaViolation {
                source_type: source.node_type,
                relation,
                target_type: target.node_type,
            });
        }

        if source.id.is_some() && source.id == target.id {
            return Err(Error::SelfReference);
        }

        Ok(ValidatedTriple {
            source_type: source.node_type,
            relation,
            target_type: target.node_type,
        })
    }
}
