use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::node::NodeId;

/// Furthest state a candidate reached before it was merged or dropped.
///
/// `Received -> Normalized -> Resolved -> Validated -> Merged`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripleStage {
    Received,
    Normalized,
    Resolved,
    Validated,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub document_id: String,
    /// Last state reached before failing.
    pub stage: TripleStage,
    pub kind: ErrorKind,
    pub message: String,
    pub candidate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    AmbiguousMerge,
    TypeConflict,
    Isolated,
    UnrecoverableInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: String) -> Self {
        Self {
            kind,
            document_id: None,
            node_id: None,
            message,
        }
    }

    #[must_use]
    pub fn in_document(mut self, document_id: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self
    }

    #[must_use]
    pub fn for_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub nodes_created: usize,
    pub nodes_merged: usize,
    pub edges_created: usize,
    pub edges_corroborated: usize,
    /// How many times this document id was ingested.
    pub ingestions: usize,
}

impl DocumentStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &Self) {
        self.candidates += other.candidates;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.nodes_created += other.nodes_created;
        self.nodes_merged += other.nodes_merged;
        self.edges_created += other.edges_created;
        self.edges_corroborated += other.edges_corroborated;
        self.ingestions += other.ingestions;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub documents: usize,
    pub nodes: usize,
    pub edges: usize,
    pub components: usize,
    pub totals: DocumentStats,
    pub rejections: BTreeMap<ErrorKind, usize>,
    pub diagnostics: BTreeMap<DiagnosticKind, usize>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} documents, {} nodes, {} edges; {} accepted, {} rejected",
            self.documents, self.nodes, self.edges, self.totals.accepted, self.totals.rejected
        )?;
        for (kind, count) in &self.rejections {
            write!(f, ", {kind}: {count}")?;
        }
        for (kind, count) in &self.diagnostics {
            write!(f, ", {kind:?}: {count}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub started_at: DateTime<Utc>,
    pub documents: BTreeMap<String, DocumentStats>,
    pub rejections: Vec<Rejection>,
    pub diagnostics: Vec<Diagnostic>,
    pub node_count: usize,
    pub edge_count: usize,
    /// Weakly connected components of the finalized graph.
    pub component_count: usize,
}

impl ExtractionReport {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            documents: BTreeMap::new(),
            rejections: Vec::new(),
            diagnostics: Vec::new(),
            node_count: 0,
            edge_count: 0,
            component_count: 0,
        }
    }

    pub fn document_mut(&mut self, document_id: &str) -> &mut DocumentStats {
        self.documents.entry(document_id.to_string()).or_default()
    }

    pub fn reject(
        &mut self,
        document_id: &str,
        stage: TripleStage,
        error: &Error,
        candidate: &impl std::fmt::Display,
    ) {
        tracing::warn!(
            document = document_id,
            ?stage,
            kind = %error.kind(),
            "Rejected candidate: {}",
            error
        );
        self.document_mut(document_id).rejected += 1;
        self.rejections.push(Rejection {
            document_id: document_id.to_string(),
            stage,
            kind: error.kind(),
            message: error.to_string(),
            candidate: candidate.to_string(),
        });
    }

    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(kind = ?diagnostic.kind, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn rejections_of(&self, kind: ErrorKind) -> impl Iterator<Item = &Rejection> {
        self.rejections.iter().filter(move |r| r.kind == kind)
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut totals = DocumentStats::new();
        for stats in self.documents.values() {
            totals.add(stats);
        }

        let mut rejections = BTreeMap::new();
        for rejection in &self.rejections {
            *rejections.entry(rejection.kind).or_insert(0) += 1;
        }

        let mut diagnostics = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *diagnostics.entry(diagnostic.kind).or_insert(0) += 1;
        }

        RunSummary {
            documents: self.documents.len(),
            nodes: self.node_count,
            edges: self.edge_count,
            components: self.component_count,
            totals,
            rejections,
            diagnostics,
        }
    }
}
