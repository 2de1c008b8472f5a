//! Fixed vocabulary of node and edge types and the table of legal
//! `(source type, relation, target type)` triples.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Faculty,
    PhDScholar,
    PostDoc,
    BSMSStudent,
    ResearchGroup,
    Department,
    Institute,
}

/// Broad family a node type belongs to. Only types of the same kind can
/// ever be observed for the same real-world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Person,
    Organization,
}

impl NodeType {
    pub const ALL: [Self; 7] = [
        Self::Faculty,
        Self::PhDScholar,
        Self::PostDoc,
        Self::BSMSStudent,
        Self::ResearchGroup,
        Self::Department,
        Self::Institute,
    ];

    pub const STUDENTS: [Self; 3] = [Self::PhDScholar, Self::PostDoc, Self::BSMSStudent];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faculty => "Faculty",
            Self::PhDScholar => "PhDScholar",
            Self::PostDoc => "PostDoc",
            Self::BSMSStudent => "BSMSStudent",
            Self::ResearchGroup => "ResearchGroup",
            Self::Department => "Department",
            Self::Institute => "Institute",
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Faculty | Self::PhDScholar | Self::PostDoc | Self::BSMSStudent => {
                NodeKind::Person
            }
            Self::ResearchGroup | Self::Department | Self::Institute => NodeKind::Organization,
        }
    }

    /// Hierarchy roots may legitimately have few or no edges.
    #[must_use]
    pub fn is_hierarchy_root(&self) -> bool {
        matches!(self, Self::Department | Self::Institute)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = crate::Error;

    /// Matching ignores case and any non-alphanumeric characters, so
    /// `"PhD Scholar"`, `"phd_scholar"` and `"PhDScholar"` are the same hint.
    fn from_str(s: &str) -> Result<Self> {
        match squash(s).as_str() {
            "faculty" | "professor" => Ok(Self::Faculty),
            "phdscholar" | "phd" | "phdstudent" => Ok(Self::PhDScholar),
            "postdoc" | "postdoctoral" | "postdoctoralfellow" => Ok(Self::PostDoc),
            "bsmsstudent" | "bsms" | "msstudent" => Ok(Self::BSMSStudent),
            "researchgroup" | "group" | "lab" => Ok(Self::ResearchGroup),
            "department" | "dept" => Ok(Self::Department),
            "institute" => Ok(Self::Institute),
            _ => Err(Error::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    BelongsTo,
    GuidedBy,
    MemberOf,
    Heads,
    PartOf,
}

impl RelationType {
    pub const ALL: [Self; 5] = [
        Self::BelongsTo,
        Self::GuidedBy,
        Self::MemberOf,
        Self::Heads,
        Self::PartOf,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelongsTo => "belongsTo",
            Self::GuidedBy => "guidedBy",
            Self::MemberOf => "memberOf",
            Self::Heads => "heads",
            Self::PartOf => "partOf",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match squash(s).as_str() {
            "belongsto" => Ok(Self::BelongsTo),
            "guidedby" | "supervisedby" => Ok(Self::GuidedBy),
            "memberof" => Ok(Self::MemberOf),
            "heads" | "headof" => Ok(Self::Heads),
            "partof" => Ok(Self::PartOf),
            _ => Err(Error::UnknownRelation(s.to_string())),
        }
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaRule {
    pub source: NodeType,
    pub relation: RelationType,
    pub target: NodeType,
}

impl SchemaRule {
    #[must_use]
    pub const fn new(source: NodeType, relation: RelationType, target: NodeType) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }
}

/// The legal edge table. Built once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    rules: BTreeSet<SchemaRule>,
}

impl SchemaRegistry {
    /// The department graph schema:
    ///
    /// | source                | relation  | target                    |
    /// |-----------------------|-----------|---------------------------|
    /// | Faculty / any student | belongsTo | Department                |
    /// | any student           | guidedBy  | Faculty                   |
    /// | Faculty / any student | memberOf  | ResearchGroup             |
    /// | Faculty               | heads     | Department, ResearchGroup |
    /// | Department            | partOf    | Institute                 |
    pub fn standard() -> Result<Self> {
        use NodeType::{Department, Faculty, Institute, ResearchGroup};
        use RelationType::{BelongsTo, GuidedBy, Heads, MemberOf, PartOf};

        let mut rules = Vec::new();
        for source in std::iter::once(Faculty).chain(NodeType::STUDENTS) {
            rules.push(SchemaRule::new(source, BelongsTo, Department));
            rules.push(SchemaRule::new(source, MemberOf, ResearchGroup));
        }
        for student in NodeType::STUDENTS {
            rules.push(SchemaRule::new(student, GuidedBy, Faculty));
        }
        rules.push(SchemaRule::new(Faculty, Heads, Department));
        rules.push(SchemaRule::new(Faculty, Heads, ResearchGroup));
        rules.push(SchemaRule::new(Department, PartOf, Institute));

        Self::from_rules(rules)
    }

    /// Builds a registry from an explicit rule list. Every node type and
    /// every relation type must take part in at least one rule, otherwise
    /// nothing downstream could be validated against it.
    pub fn from_rules(rules: impl IntoIterator<Item = SchemaRule>) -> Result<Self> {
        let rules: BTreeSet<SchemaRule> = rules.into_iter().collect();

        if rules.is_empty() {
            return Err(Error::CorruptSchema("no rules defined".into()));
        }

        for relation in RelationType::ALL {
            if !rules.iter().any(|r| r.relation == relation) {
                return Err(Error::CorruptSchema(format!(
                    "relation {relation} has no rule"
                )));
            }
        }

        for node_type in NodeType::ALL {
            if !rules
                .iter()
                .any(|r| r.source == node_type || r.target == node_type)
            {
                return Err(Error::CorruptSchema(format!(
                    "node type {node_type} appears in no rule"
                )));
            }
        }

        Ok(Self { rules })
    }

    #[must_use]
    pub fn is_valid_edge(
        &self,
        source: NodeType,
        relation: RelationType,
        target: NodeType,
    ) -> bool {
        self.rules
            .contains(&SchemaRule::new(source, relation, target))
    }

    /// String-level lookup. Names outside the vocabulary report
    /// `UnknownType` / `UnknownRelation` instead of answering `false`.
    pub fn check_edge(&self, source: &str, relation: &str, target: &str) -> Result<bool> {
        let source = self.node_type(source)?;
        let relation = self.relation_type(relation)?;
        let target = self.node_type(target)?;
        Ok(self.is_valid_edge(source, relation, target))
    }

    pub fn node_type(&self, name: &str) -> Result<NodeType> {
        name.parse()
    }

    pub fn relation_type(&self, name: &str) -> Result<RelationType> {
        name.parse()
    }

    #[must_use]
    pub fn valid_node_types(&self) -> BTreeSet<NodeType> {
        NodeType::ALL.into_iter().collect()
    }

    #[must_use]
    pub fn valid_relation_types(&self) -> BTreeSet<RelationType> {
        RelationType::ALL.into_iter().collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &SchemaRule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let schema = SchemaRegistry::standard().unwrap();

        assert_eq!(schema.rules().count(), 14);

        assert!(schema.is_valid_edge(NodeType::Faculty, RelationType::Heads, NodeType::Department));
        assert!(schema.is_valid_edge(
            NodeType::Faculty,
            RelationType::Heads,
            NodeType::ResearchGroup
        ));
        assert!(schema.is_valid_edge(
            NodeType::BSMSStudent,
            RelationType::GuidedBy,
            NodeType::Faculty
        ));
        assert!(schema.is_valid_edge(
            NodeType::PostDoc,
            RelationType::BelongsTo,
            NodeType::Department
        ));
        assert!(schema.is_valid_edge(
            NodeType::Department,
            RelationType::PartOf,
            NodeType::Institute
        ));

        assert!(!schema.is_valid_edge(
            NodeType::Institute,
            RelationType::GuidedBy,
            NodeType::Faculty
        ));
        assert!(!schema.is_valid_edge(
            NodeType::Faculty,
            RelationType::GuidedBy,
            NodeType::Faculty
        ));
        assert!(!schema.is_valid_edge(
            NodeType::PhDScholar,
            RelationType::Heads,
            NodeType::ResearchGroup
        ));
    }

    #[test]
    fn test_check_edge_reports_unknown_names() {
        let schema = SchemaRegistry::standard().unwrap();

        assert!(schema.check_edge("Faculty", "heads", "Department").unwrap());
        assert!(!schema.check_edge("Institute", "guidedBy", "Faculty").unwrap());
        assert!(matches!(
            schema.check_edge("Janitor", "heads", "Department"),
            Err(Error::UnknownType(_))
        ));
        assert!(matches!(
            schema.check_edge("Faculty", "teaches", "Department"),
            Err(Error::UnknownRelation(_))
        ));
    }

    #[test]
    fn test_tolerant_parsing() {
        assert_eq!("PhD Scholar".parse::<NodeType>().unwrap(), NodeType::PhDScholar);
        assert_eq!("phd_scholar".parse::<NodeType>().unwrap(), NodeType::PhDScholar);
        assert_eq!("BS-MS Student".parse::<NodeType>().unwrap(), NodeType::BSMSStudent);
        assert_eq!("Post-Doc".parse::<NodeType>().unwrap(), NodeType::PostDoc);
        assert_eq!("GUIDED_BY".parse::<RelationType>().unwrap(), RelationType::GuidedBy);
        assert_eq!("part of".parse::<RelationType>().unwrap(), RelationType::PartOf);
        assert!("student".parse::<NodeType>().is_err());
        assert!("collaboratesWith".parse::<RelationType>().is_err());
    }

    #[test]
    fn test_as_str_round_trips_through_from_str() {
        for node_type in NodeType::ALL {
            assert_eq!(node_type.as_str().parse::<NodeType>().unwrap(), node_type);
        }
        for relation in RelationType::ALL {
            assert_eq!(relation.as_str().parse::<RelationType>().unwrap(), relation);
        }
    }

    #[test]
    fn test_missing_relation_is_corrupt() {
        let rules = SchemaRegistry::standard()
            .unwrap()
            .rules()
            .copied()
            .filter(|r| r.relation != RelationType::PartOf)
            .collect::<Vec<_>>();

        assert!(matches!(
            SchemaRegistry::from_rules(rules),
            Err(Error::CorruptSchema(_))
        ));
        assert!(matches!(
            SchemaRegistry::from_rules(Vec::new()),
            Err(Error::CorruptSchema(_))
        ));
    }

    #[test]
    fn test_node_kinds() {
        assert_eq!(NodeType::PostDoc.kind(), NodeKind::Person);
        assert_eq!(NodeType::ResearchGroup.kind(), NodeKind::Organization);
        assert!(NodeType::Institute.is_hierarchy_root());
        assert!(!NodeType::ResearchGroup.is_hierarchy_root());
    }
}
