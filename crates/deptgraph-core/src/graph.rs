//! The finalized, frozen graph and its flat export form.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::{Attributes, Node, NodeId};
use crate::schema::{NodeType, RelationType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub attributes: Attributes,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            node_type: node.node_type,
            canonical_name: node.canonical_name.clone(),
            aliases: node.aliases.clone(),
            attributes: node.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relation_type: RelationType,
    pub provenance: Vec<String>,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            source_id: edge.source_id,
            target_id: edge.target_id,
            relation_type: edge.relation_type,
            provenance: edge.provenance.iter().cloned().collect(),
        }
    }
}

/// Serialization-ready view: two ordered sequences of flat records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
}

impl Graph {
    #[must_use]
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let index = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        Self {
            nodes,
            edges,
            index,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }

    pub fn edges_from(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source_id == id)
    }

    /// Incident edges in either direction.
    pub fn degree(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.touches(id)).count()
    }

    /// Nodes without any incident edge.
    pub fn isolated_nodes(&self) -> impl Iterator<Item = &Node> {
        let connected: HashSet<NodeId> = self
            .edges
            .iter()
            .flat_map(|e| [e.source_id, e.target_id])
            .collect();
        self.nodes
            .iter()
            .filter(move |n| !connected.contains(&n.id))
    }

    /// Edges whose endpoints are missing from the node set. Empty for any
    /// graph built by the assembler.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| {
            !self.index.contains_key(&e.source_id) || !self.index.contains_key(&e.target_id)
        })
    }

    pub fn find_by_name(&self, node_type: NodeType, name: &str) -> Option<&Node> {
        self.nodes_of_type(node_type)
            .find(|n| n.canonical_name == name || n.aliases.iter().any(|a| a == name))
    }

    /// Directed petgraph view; node weights are ids, edge weights relation
    /// types. Dangling edges are skipped.
    #[must_use]
    pub fn to_petgraph(&self) -> DiGraph<NodeId, RelationType> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let indices: HashMap<NodeId, NodeIndex> = self
            .nodes
            .iter()
            .map(|n| (n.id, graph.add_node(n.id)))
            .collect();

        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (indices.get(&edge.source_id), indices.get(&edge.target_id))
            {
                graph.add_edge(a, b, edge.relation_type);
            }
        }

        graph
    }

    #[must_use]
    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.nodes.iter().map(NodeRecord::from).collect(),
            edges: self.edges.iter().map(EdgeRecord::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::algo::connected_components;

    fn sample() -> (Graph, NodeId, NodeId, NodeId) {
        let faculty = NodeId::derive(0, NodeType::Faculty, "a sharma");
        let dept = NodeId::derive(1, NodeType::Department, "dse");
        let loner = NodeId::derive(2, NodeType::PhDScholar, "r verma");

        let mut a = Node::new(faculty, NodeType::Faculty, "A. Sharma".into());
        a.add_alias("Dr. A. Sharma");
        let b = Node::new(dept, NodeType::Department, "DSE".into());
        let c = Node::new(loner, NodeType::PhDScholar, "R. Verma".into());

        let mut edge = Edge::new(faculty, dept, RelationType::Heads, "d2").unwrap();
        edge.corroborate("d1");

        (Graph::new(vec![a, b, c], vec![edge]), faculty, dept, loner)
    }

    #[test]
    fn test_queries() {
        let (graph, faculty, dept, loner) = sample();

        assert_eq!(graph.degree(faculty), 1);
        assert_eq!(graph.degree(dept), 1);
        assert_eq!(graph.degree(loner), 0);
        assert_eq!(graph.edges_from(faculty).count(), 1);
        assert_eq!(graph.edges_from(dept).count(), 0);
        assert_eq!(
            graph.isolated_nodes().map(|n| n.id).collect::<Vec<_>>(),
            vec![loner]
        );
        assert_eq!(graph.dangling_edges().count(), 0);
        assert_eq!(
            graph.find_by_name(NodeType::Faculty, "Dr. A. Sharma").map(|n| n.id),
            Some(faculty)
        );
    }

    #[test]
    fn test_dangling_edge_detected() {
        let (graph, faculty, _, _) = sample();
        let ghost = NodeId::derive(9, NodeType::ResearchGroup, "ghost");
        let mut edges = graph.edges().to_vec();
        edges.push(Edge::new(faculty, ghost, RelationType::Heads, "d3").unwrap());

        let broken = Graph::new(graph.nodes().to_vec(), edges);

        assert_eq!(broken.dangling_edges().count(), 1);
        assert_eq!(broken.to_petgraph().edge_count(), 1);
    }

    #[test]
    fn test_petgraph_view() {
        let (graph, _, _, _) = sample();
        let pg = graph.to_petgraph();

        assert_eq!(pg.node_count(), 3);
        assert_eq!(pg.edge_count(), 1);
        assert_eq!(connected_components(&pg), 2);
    }

    #[test]
    fn test_export_shape() {
        let (graph, faculty, _, _) = sample();
        let value = serde_json::to_value(graph.export()).unwrap();

        let node = &value["nodes"][0];
        assert_eq!(node["id"], faculty.to_string());
        assert_eq!(node["type"], "Faculty");
        assert_eq!(node["canonicalName"], "A. Sharma");
        assert_eq!(node["aliases"][0], "Dr. A. Sharma");

        let edge = &value["edges"][0];
        assert_eq!(edge["relationType"], "heads");
        assert_eq!(edge["provenance"], serde_json::json!(["d1", "d2"]));
    }
}
