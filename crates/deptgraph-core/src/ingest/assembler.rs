//! Document-by-document graph assembly.
//!
//! The assembler is the single writer for the identity store and the edge
//! set. Each candidate triple is normalized, its endpoints are planned
//! against the store, the planned triple is validated, and only then are
//! the endpoint resolutions committed. A rejected triple therefore leaves
//! no node, alias or mention behind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use petgraph::algo::connected_components;
use tracing::{debug, info};

use super::normalizer::{NormalizedMention, Normalizer};
use super::report::{Diagnostic, DiagnosticKind, DocumentStats, ExtractionReport, TripleStage};
use super::resolver::{EntityResolver, IdentityStore, Resolution, ResolvedNode};
use super::validator::{Endpoint, RelationValidator};
use crate::candidate::{CandidateNode, CandidateTriple, Extraction};
use crate::config::ResolverConfig;
use crate::edge::{Edge, EdgeKey};
use crate::graph::Graph;
use crate::node::{Attributes, NodeId};
use crate::schema::{RelationType, SchemaRegistry};
use crate::{Error, Result};

/// A finalized graph together with the report describing how it was built.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub graph: Graph,
    pub report: ExtractionReport,
}

pub struct GraphAssembler {
    schema: SchemaRegistry,
    resolver: EntityResolver,
    store: IdentityStore,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeKey, usize>,
    report: ExtractionReport,
}

impl GraphAssembler {
    #[must_use]
    pub fn new(schema: SchemaRegistry, config: ResolverConfig) -> Self {
        Self::starting_at(schema, config, Utc::now())
    }

    /// Like [`GraphAssembler::new`] with a fixed run start, so reports of
    /// replayed runs compare equal.
    #[must_use]
    pub fn starting_at(
        schema: SchemaRegistry,
        config: ResolverConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema,
            resolver: EntityResolver::new(config),
            store: IdentityStore::new(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            report: ExtractionReport::new(started_at),
        }
    }

    /// Assembler over the standard department schema.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(SchemaRegistry::standard()?, ResolverConfig::default()))
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn ingest_document(
        &mut self,
        document_id: &str,
        candidates: Vec<CandidateTriple>,
    ) -> DocumentStats {
        self.ingest_extraction(document_id, Extraction::from_triples(candidates))
    }

    /// Ingests everything extracted from one document. Failures are recorded
    /// in the report; nothing here aborts the run.
    pub fn ingest_extraction(&mut self, document_id: &str, extraction: Extraction) -> DocumentStats {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            self.record_unrecoverable("", "document has no id");
            return DocumentStats::new();
        }

        let mut stats = DocumentStats {
            candidates: extraction.len(),
            ingestions: 1,
            ..DocumentStats::new()
        };

        if extraction.is_empty() {
            self.record_unrecoverable(document_id, "extraction produced no candidates");
        }

        for node in &extraction.nodes {
            self.ingest_node(document_id, node, &mut stats);
        }
        for triple in &extraction.triples {
            self.ingest_triple(document_id, triple, &mut stats);
        }

        info!(
            document = document_id,
            candidates = stats.candidates,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "Ingested document"
        );

        // `reject` already counted rejections into the report.
        let merged = DocumentStats {
            rejected: 0,
            ..stats.clone()
        };
        self.report.document_mut(document_id).add(&merged);
        stats
    }

    /// Records a document that could not be processed at all. The run
    /// continues without it.
    pub fn record_unrecoverable(&mut self, document_id: &str, reason: &str) {
        let error = Error::UnrecoverableInput {
            document_id: document_id.to_string(),
            reason: reason.to_string(),
        };
        let mut diagnostic = Diagnostic::new(DiagnosticKind::UnrecoverableInput, error.to_string());
        if !document_id.is_empty() {
            self.report.document_mut(document_id);
            diagnostic = diagnostic.in_document(document_id);
        }
        self.report.diagnose(diagnostic);
    }

    fn ingest_node(&mut self, document_id: &str, candidate: &CandidateNode, stats: &mut DocumentStats) {
        let mention = match self.normalize(candidate.mention.as_deref(), candidate.type_hint.as_deref())
        {
            Ok(mention) => mention,
            Err(e) => {
                let stage = stage_for(&e);
                self.report.reject(document_id, stage, &e, candidate);
                stats.rejected += 1;
                return;
            }
        };

        let resolved =
            self.resolver
                .resolve(&mut self.store, &mention, &candidate.attributes, document_id);
        self.account(document_id, &mention, &resolved, stats);
        stats.accepted += 1;
        debug!(document = document_id, node = %resolved.id, "Merged node observation");
    }

    fn ingest_triple(
        &mut self,
        document_id: &str,
        candidate: &CandidateTriple,
        stats: &mut DocumentStats,
    ) {
        debug!(document = document_id, candidate = %candidate, "Received");

        let source = self.normalize_endpoint(
            candidate.source_mention.as_deref(),
            candidate.source_type_hint.as_deref(),
        );
        let target = self.normalize_endpoint(
            candidate.target_mention.as_deref(),
            candidate.target_type_hint.as_deref(),
        );
        let (source, target) = match (source, target) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(e), _) | (_, Err(e)) => {
                self.reject(document_id, TripleStage::Received, &e, candidate, stats);
                return;
            }
        };
        debug!(document = document_id, "Normalized");

        let source_plan = source.as_ref().map(|m| self.resolver.plan(&self.store, &m.key));
        let staged = source
            .as_ref()
            .zip(source_plan.as_ref())
            .map(|(m, p)| self.resolver.stage(&self.store, &m.key, p));
        // The target is planned as if the source were already committed.
        let target_plan = target.as_ref().map(|m| match &staged {
            Some(staged) => self.resolver.plan_after(&self.store, staged, &m.key),
            None => self.resolver.plan(&self.store, &m.key),
        });

        let source_endpoint = staged.as_ref().map(|s| Endpoint {
            id: Some(s.id),
            node_type: s.node_type,
        });
        let target_endpoint = target.as_ref().zip(target_plan.as_ref()).map(|(m, p)| Endpoint {
            id: p.existing(),
            node_type: match &staged {
                Some(s) => EntityResolver::resolved_type_after(&self.store, s, &m.key, p),
                None => EntityResolver::resolved_type(&self.store, &m.key, p),
            },
        });

        let stage = if source_endpoint.is_some() && target_endpoint.is_some() {
            TripleStage::Resolved
        } else {
            TripleStage::Normalized
        };

        let validated = match RelationValidator::new(&self.schema).validate(
            candidate,
            source_endpoint.as_ref(),
            target_endpoint.as_ref(),
        ) {
            Ok(validated) => validated,
            Err(e) => {
                self.reject(document_id, stage, &e, candidate, stats);
                return;
            }
        };
        debug!(document = document_id, relation = %validated.relation, "Validated");

        // Both endpoints are present once validation has passed.
        let (Some(source), Some(target), Some(source_plan), Some(target_plan)) =
            (source, target, source_plan, target_plan)
        else {
            return;
        };

        let source_node = self.resolver.apply(
            &mut self.store,
            &source,
            source_plan,
            &candidate.source_attributes,
            document_id,
        );
        self.account(document_id, &source, &source_node, stats);

        let target_node = self.resolver.apply(
            &mut self.store,
            &target,
            target_plan,
            &candidate.target_attributes,
            document_id,
        );
        self.account(document_id, &target, &target_node, stats);

        self.merge_edge(document_id, source_node.id, target_node.id, validated.relation, stats);
        stats.accepted += 1;
    }

    fn merge_edge(
        &mut self,
        document_id: &str,
        source_id: NodeId,
        target_id: NodeId,
        relation: RelationType,
        stats: &mut DocumentStats,
    ) {
        let key = EdgeKey {
            source_id,
            relation_type: relation,
            target_id,
        };

        if let Some(&index) = self.edge_index.get(&key) {
            if self.edges[index].corroborate(document_id) {
                stats.edges_corroborated += 1;
                debug!(document = document_id, %relation, "Corroborated edge");
            }
            return;
        }

        match Edge::new(source_id, target_id, relation, document_id) {
            Ok(edge) => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
                stats.edges_created += 1;
                debug!(document = document_id, %relation, "Merged");
            }
            Err(e) => {
                let rendered = format!("({source_id}) -[{relation}]-> ({target_id})");
                self.report
                    .reject(document_id, TripleStage::Validated, &e, &rendered);
                stats.rejected += 1;
            }
        }
    }

    /// Updates stats and records an ambiguity diagnostic for one committed
    /// resolution.
    fn account(
        &mut self,
        document_id: &str,
        mention: &NormalizedMention,
        resolved: &ResolvedNode,
        stats: &mut DocumentStats,
    ) {
        if resolved.is_new() {
            stats.nodes_created += 1;
        } else {
            stats.nodes_merged += 1;
        }

        if let Resolution::Ambiguous { candidates } = &resolved.resolution {
            let names: Vec<&str> = candidates
                .iter()
                .filter_map(|id| self.store.get(*id))
                .map(|n| n.canonical_name.as_str())
                .collect();
            let message = format!(
                "{:?} is similar to {} existing {} nodes ({}); kept as a separate node",
                mention.raw,
                candidates.len(),
                mention.key.node_type,
                names.join(", ")
            );
            self.report.diagnose(
                Diagnostic::new(DiagnosticKind::AmbiguousMerge, message)
                    .in_document(document_id)
                    .for_node(resolved.id),
            );
        }

        if !resolved.attribute_conflicts.is_empty() {
            debug!(
                node = %resolved.id,
                keys = ?resolved.attribute_conflicts,
                "Kept existing attribute values"
            );
        }
    }

    fn reject(
        &mut self,
        document_id: &str,
        stage: TripleStage,
        error: &Error,
        candidate: &CandidateTriple,
        stats: &mut DocumentStats,
    ) {
        self.report.reject(document_id, stage, error, candidate);
        stats.rejected += 1;
    }

    fn normalize(&self, mention: Option<&str>, type_hint: Option<&str>) -> Result<NormalizedMention> {
        let mention =
            mention.ok_or_else(|| Error::UnresolvedEntity("mention is missing".to_string()))?;
        let type_hint = type_hint.ok_or_else(|| Error::InvalidTypeHint(String::new()))?;
        Normalizer::new(&self.schema).normalize(mention, type_hint)
    }

    /// `Ok(None)` for a mention that cannot denote any entity; the validator
    /// reports it as unresolved.
    fn normalize_endpoint(
        &self,
        mention: Option<&str>,
        type_hint: Option<&str>,
    ) -> Result<Option<NormalizedMention>> {
        match self.normalize(mention, type_hint) {
            Ok(mention) => Ok(Some(mention)),
            Err(Error::UnresolvedEntity(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Frozen snapshot of the current state. Calling it repeatedly without
    /// further ingestion yields equal graphs.
    #[must_use]
    pub fn finalize(&self) -> Graph {
        Graph::new(self.store.nodes().cloned().collect(), self.edges.clone())
    }

    /// The report including the global consistency sweep over the
    /// finalized graph.
    #[must_use]
    pub fn report(&self) -> ExtractionReport {
        let graph = self.finalize();
        self.sweep(&graph)
    }

    #[must_use]
    pub fn output(&self) -> AssemblyOutput {
        let graph = self.finalize();
        let report = self.sweep(&graph);
        info!(summary = %report.summary(), "Assembly finished");
        AssemblyOutput { graph, report }
    }

    fn sweep(&self, graph: &Graph) -> ExtractionReport {
        let mut report = self.report.clone();

        for node in graph.isolated_nodes() {
            if node.node_type.is_hierarchy_root() {
                continue;
            }
            report.diagnose(
                Diagnostic::new(
                    DiagnosticKind::Isolated,
                    format!("{} {:?} has no relationships", node.node_type, node.canonical_name),
                )
                .for_node(node.id),
            );
        }

        for node in graph.nodes().iter().filter(|n| n.has_type_conflict()) {
            let observed: Vec<&str> = node.conflicting_types.iter().map(|t| t.as_str()).collect();
            report.diagnose(
                Diagnostic::new(
                    DiagnosticKind::TypeConflict,
                    format!(
                        "{:?} kept type {} but was also seen as {}",
                        node.canonical_name,
                        node.node_type,
                        observed.join(", ")
                    ),
                )
                .for_node(node.id),
            );
        }

        report.node_count = graph.nodes().len();
        report.edge_count = graph.edges().len();
        report.component_count = connected_components(&graph.to_petgraph());
        report
    }
}

/// Attributes of an endpoint, for callers assembling candidates by hand.
#[must_use]
pub fn attributes<I, K>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

fn stage_for(error: &Error) -> TripleStage {
    match error {
        Error::UnresolvedEntity(_) => TripleStage::Normalized,
        _ => TripleStage::Received,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::NodeType;

    fn assembler() -> GraphAssembler {
        GraphAssembler::starting_at(
            SchemaRegistry::standard().unwrap(),
            ResolverConfig::default(),
            DateTime::UNIX_EPOCH,
        )
    }

    fn triple(s: &str, st: &str, r: &str, t: &str, tt: &str) -> CandidateTriple {
        CandidateTriple::new(s, st, r, t, tt)
    }

    /// Edges projected onto canonical names, independent of id assignment.
    fn named_edges(graph: &Graph) -> BTreeSet<(String, RelationType, String)> {
        graph
            .edges()
            .iter()
            .map(|e| {
                (
                    graph.node(e.source_id).unwrap().canonical_name.clone(),
                    e.relation_type,
                    graph.node(e.target_id).unwrap().canonical_name.clone(),
                )
            })
            .collect()
    }

    fn named_nodes(graph: &Graph) -> BTreeSet<(NodeType, String)> {
        graph
            .nodes()
            .iter()
            .map(|n| (n.node_type, n.canonical_name.clone()))
            .collect()
    }

    #[test]
    fn test_end_to_end_example() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![triple("Dr. A. Sharma", "Faculty", "heads", "DSE", "Department")],
        );
        asm.ingest_document(
            "d2",
            vec![triple("A Sharma", "Faculty", "heads", "DSE", "Department")],
        );

        let graph = asm.finalize();

        assert_eq!(graph.nodes_of_type(NodeType::Faculty).count(), 1);
        assert_eq!(graph.nodes_of_type(NodeType::Department).count(), 1);
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edges().len(), 1);

        let faculty = graph.nodes_of_type(NodeType::Faculty).next().unwrap();
        assert_eq!(faculty.aliases, vec!["Dr. A. Sharma", "A Sharma"]);

        let edge = &graph.edges()[0];
        assert_eq!(edge.relation_type, RelationType::Heads);
        assert_eq!(edge.source_id, faculty.id);
        assert_eq!(
            edge.provenance.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["d1", "d2"]
        );
    }

    #[test]
    fn test_reingesting_document_only_grows_nothing() {
        let mut asm = assembler();
        let candidates = vec![
            triple("R. Verma", "PhD Scholar", "guidedBy", "A Sharma", "Faculty"),
            triple("A Sharma", "Faculty", "belongsTo", "DSE", "Department"),
        ];

        asm.ingest_document("d1", candidates.clone());
        let before = asm.finalize();
        let stats = asm.ingest_document("d1", candidates);
        let after = asm.finalize();

        assert_eq!(before, after);
        assert_eq!(stats.nodes_created, 0);
        assert_eq!(stats.edges_created, 0);
        assert_eq!(stats.edges_corroborated, 0);
        assert_eq!(asm.report().documents["d1"].ingestions, 2);
    }

    #[test]
    fn test_corroboration_across_documents() {
        let mut asm = assembler();
        asm.ingest_document("d1", vec![triple("Meera Iyer", "Faculty", "heads", "ML Lab", "ResearchGroup")]);
        let stats = asm.ingest_document(
            "d2",
            vec![triple("Prof. Meera Iyer", "Faculty", "heads", "ML Lab", "ResearchGroup")],
        );

        assert_eq!(stats.edges_created, 0);
        assert_eq!(stats.edges_corroborated, 1);
        assert_eq!(stats.nodes_merged, 2);
        assert_eq!(asm.finalize().edges()[0].provenance.len(), 2);
    }

    #[test]
    fn test_schema_violation_leaves_no_trace() {
        let mut asm = assembler();
        let stats = asm.ingest_document(
            "d1",
            vec![triple("IISER", "Institute", "guidedBy", "A Sharma", "Faculty")],
        );

        assert_eq!(stats.rejected, 1);
        assert_eq!(asm.node_count(), 0);
        assert_eq!(asm.edge_count(), 0);

        let report = asm.report();
        let rejection = &report.rejections[0];
        assert_eq!(rejection.kind, ErrorKind::SchemaViolation);
        assert_eq!(rejection.stage, TripleStage::Resolved);
        assert_eq!(rejection.document_id, "d1");
        assert_eq!(report.documents["d1"].rejected, 1);
    }

    #[test]
    fn test_rejections_carry_reason_and_stage() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![
                triple("A Sharma", "Wizard", "heads", "DSE", "Department"),
                triple("Dr.", "Faculty", "heads", "DSE", "Department"),
                triple("A Sharma", "Faculty", "teaches", "DSE", "Department"),
                CandidateTriple {
                    target_mention: None,
                    ..triple("A Sharma", "Faculty", "heads", "DSE", "Department")
                },
            ],
        );

        let report = asm.report();
        let kinds: Vec<_> = report.rejections.iter().map(|r| (r.kind, r.stage)).collect();
        assert_eq!(
            kinds,
            vec![
                (ErrorKind::InvalidTypeHint, TripleStage::Received),
                (ErrorKind::UnresolvedEntity, TripleStage::Normalized),
                (ErrorKind::UnknownRelation, TripleStage::Resolved),
                (ErrorKind::UnresolvedEntity, TripleStage::Normalized),
            ]
        );
        assert_eq!(asm.node_count(), 0);
        assert_eq!(report.documents["d1"].rejected, 4);
        assert_eq!(report.documents["d1"].candidates, 4);
    }

    #[test]
    fn test_no_dangling_edges() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![
                triple("R. Verma", "PhDScholar", "guidedBy", "A Sharma", "Faculty"),
                triple("R. Verma", "PhDScholar", "memberOf", "ML Lab", "ResearchGroup"),
                triple("A Sharma", "Faculty", "heads", "ML Lab", "ResearchGroup"),
                triple("DSE", "Department", "partOf", "IISER Bhopal", "Institute"),
                triple("IISER Bhopal", "Institute", "heads", "DSE", "Department"),
            ],
        );

        let graph = asm.finalize();
        assert_eq!(graph.edges().len(), 4);
        assert_eq!(graph.dangling_edges().count(), 0);
        for edge in graph.edges() {
            assert!(graph.node(edge.source_id).is_some());
            assert!(graph.node(edge.target_id).is_some());
        }
    }

    #[test]
    fn test_replay_is_deterministic() {
        let documents = vec![
            ("d1", vec![triple("Dr. A. Sharma", "Faculty", "heads", "DSE", "Department")]),
            ("d2", vec![triple("Rahul Sharma", "PhD", "guidedBy", "A Sharma", "Faculty")]),
            ("d3", vec![triple("Rahull Sharma", "PhD", "belongsTo", "DSE", "Department")]),
        ];

        let run = || {
            let mut asm = assembler();
            for (id, candidates) in documents.clone() {
                asm.ingest_document(id, candidates);
            }
            asm.output()
        };
        let first = run();
        let second = run();

        assert_eq!(first.graph.export(), second.graph.export());
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_order_within_document_does_not_matter() {
        let candidates = vec![
            triple("R. Verma", "PhDScholar", "guidedBy", "A Sharma", "Faculty"),
            triple("Dr. A. Sharma", "Faculty", "heads", "DSE", "Department"),
            triple("A Sharma", "Faculty", "belongsTo", "DSE", "Department"),
        ];
        let mut reversed = candidates.clone();
        reversed.reverse();

        let mut forward = assembler();
        forward.ingest_document("d1", candidates);
        let mut backward = assembler();
        backward.ingest_document("d1", reversed);

        let (a, b) = (forward.finalize(), backward.finalize());
        assert_eq!(named_edges(&a), named_edges(&b));
        assert_eq!(
            named_nodes(&a).into_iter().map(|(t, _)| t).collect::<Vec<_>>(),
            named_nodes(&b).into_iter().map(|(t, _)| t).collect::<Vec<_>>()
        );
        assert_eq!(a.nodes().len(), 3);
    }

    #[test]
    fn test_ambiguous_mention_is_diagnosed_not_merged() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![
                triple("Rohit Sharma", "Faculty", "belongsTo", "DSE", "Department"),
                triple("Rohan Sharma", "Faculty", "belongsTo", "DSE", "Department"),
            ],
        );
        asm.ingest_document(
            "d2",
            vec![triple("Rohat Sharma", "Faculty", "belongsTo", "DSE", "Department")],
        );

        assert_eq!(asm.finalize().nodes_of_type(NodeType::Faculty).count(), 3);

        let report = asm.report();
        let ambiguous: Vec<_> = report.diagnostics_of(DiagnosticKind::AmbiguousMerge).collect();
        assert_eq!(ambiguous.len(), 1);
        assert_eq!(ambiguous[0].document_id.as_deref(), Some("d2"));
        assert!(ambiguous[0].node_id.is_some());
        assert!(ambiguous[0].message.contains("Rohit Sharma"));
    }

    #[test]
    fn test_type_conflict_flagged_on_finalize() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![triple("Priya Nair", "PhD Scholar", "guidedBy", "A Sharma", "Faculty")],
        );
        asm.ingest_document(
            "d2",
            vec![triple("Priya Nair", "PostDoc", "memberOf", "ML Lab", "ResearchGroup")],
        );

        let graph = asm.finalize();
        let priya = graph.find_by_name(NodeType::PhDScholar, "Priya Nair").unwrap();
        assert!(graph.nodes_of_type(NodeType::PostDoc).next().is_none());

        let report = asm.report();
        let conflicts: Vec<_> = report.diagnostics_of(DiagnosticKind::TypeConflict).collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].node_id, Some(priya.id));
        assert!(conflicts[0].message.contains("PostDoc"));
    }

    #[test]
    fn test_isolated_nodes_flagged_except_roots() {
        let mut asm = assembler();
        asm.ingest_extraction(
            "d1",
            Extraction::new()
                .with_node(CandidateNode::new("R. Verma", "PhDScholar"))
                .with_node(CandidateNode::new("DSE", "Department")),
        );

        let graph = asm.finalize();
        assert_eq!(graph.nodes().len(), 2);

        let report = asm.report();
        let isolated: Vec<_> = report.diagnostics_of(DiagnosticKind::Isolated).collect();
        assert_eq!(isolated.len(), 1);
        assert!(isolated[0].message.contains("R. Verma"));
        assert_eq!(report.component_count, 2);
    }

    #[test]
    fn test_node_observations_merge_attributes() {
        let mut asm = assembler();
        asm.ingest_extraction(
            "d1",
            Extraction::new()
                .with_node(
                    CandidateNode::new("Dr. A. Sharma", "Faculty")
                        .with_attribute("email", json!("sharma@example.edu")),
                )
                .with_triple(
                    triple("A Sharma", "Faculty", "heads", "DSE", "Department")
                        .with_source_attributes(attributes([("office", json!("B-204"))])),
                ),
        );

        let graph = asm.finalize();
        let faculty = graph.nodes_of_type(NodeType::Faculty).next().unwrap();
        assert_eq!(faculty.attributes["email"], json!("sharma@example.edu"));
        assert_eq!(faculty.attributes["office"], json!("B-204"));
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_unrecoverable_document_does_not_abort_run() {
        let mut asm = assembler();
        asm.ingest_document("d1", Vec::new());
        asm.ingest_document("  ", vec![triple("A Sharma", "Faculty", "heads", "DSE", "Department")]);
        asm.ingest_document("d2", vec![triple("A Sharma", "Faculty", "heads", "DSE", "Department")]);

        let report = asm.report();
        assert_eq!(report.diagnostics_of(DiagnosticKind::UnrecoverableInput).count(), 2);
        assert_eq!(asm.edge_count(), 1);
        assert!(report.documents.contains_key("d1"));
    }

    #[test]
    fn test_same_name_on_both_ends_is_self_reference() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![triple("Priya Nair", "PostDoc", "guidedBy", "Priya Nair", "Faculty")],
        );

        let report = asm.report();
        assert_eq!(report.rejections[0].kind, ErrorKind::SchemaViolation);
        assert_eq!(report.rejections[0].stage, TripleStage::Resolved);
        assert_eq!(asm.edge_count(), 0);
        assert_eq!(asm.node_count(), 0);
    }

    #[test]
    fn test_endpoint_joined_by_source_commit_leaves_no_trace() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![triple("Rohin Sharma", "PhDScholar", "belongsTo", "DSE", "Department")],
        );

        // The source fuzzy-merges into Rohin; that new name would then pull
        // the Faculty target onto the same node.
        let stats = asm.ingest_document(
            "d2",
            vec![triple("Rohan Sharma", "PhDScholar", "guidedBy", "Rohan Sharma", "Faculty")],
        );

        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.nodes_merged, 0);
        assert_eq!(stats.nodes_created, 0);
        assert_eq!(asm.node_count(), 2);

        let graph = asm.finalize();
        let rohin = graph.nodes_of_type(NodeType::PhDScholar).next().unwrap();
        assert_eq!(rohin.aliases, vec!["Rohin Sharma"]);
        assert_eq!(rohin.mentioned_in.len(), 1);

        let report = asm.report();
        assert_eq!(report.rejections[0].kind, ErrorKind::SchemaViolation);
        assert_eq!(report.rejections[0].document_id, "d2");
    }

    #[test]
    fn test_same_named_department_and_group_stay_apart() {
        let mut asm = assembler();
        asm.ingest_document(
            "d1",
            vec![triple("DSE", "Department", "partOf", "IISER", "Institute")],
        );
        let stats = asm.ingest_document(
            "d2",
            vec![triple("A Sharma", "Faculty", "memberOf", "DSE", "ResearchGroup")],
        );

        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 0);

        let graph = asm.finalize();
        assert_eq!(graph.nodes_of_type(NodeType::ResearchGroup).count(), 1);
        assert_eq!(graph.nodes_of_type(NodeType::Department).count(), 1);
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_cross_type_merge_does_not_leak_into_fuzzy_matching() {
        let mut asm = GraphAssembler::starting_at(
            SchemaRegistry::standard().unwrap(),
            ResolverConfig {
                signature: crate::config::SignatureScheme::LastToken,
                similarity_threshold: 0.8,
                ..ResolverConfig::default()
            },
            DateTime::UNIX_EPOCH,
        );
        asm.ingest_document(
            "d1",
            vec![triple("Rohit Sharma", "PhDScholar", "belongsTo", "DSE", "Department")],
        );
        asm.ingest_document(
            "d2",
            vec![triple("Rohit Sharma", "Faculty", "belongsTo", "DSE", "Department")],
        );
        let stats = asm.ingest_document(
            "d3",
            vec![triple("Rohan Sharma", "Faculty", "heads", "DSE", "Department")],
        );

        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.accepted, 1);
        assert_eq!(asm.finalize().nodes_of_type(NodeType::Faculty).count(), 1);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut asm = assembler();
        asm.ingest_document("d1", vec![triple("A Sharma", "Faculty", "heads", "DSE", "Department")]);

        assert_eq!(asm.finalize(), asm.finalize());
        assert_eq!(asm.report(), asm.report());

        let output = asm.output();
        assert_eq!(output.report.node_count, 2);
        assert_eq!(output.report.edge_count, 1);
        assert_eq!(output.report.summary().totals.accepted, 1);
    }
}
