use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BoundedContext, Edge, Layer, Node, NodeId, NodeKind};

/// The Architectural Knowledge Graph for one snapshot of a repository.
///
/// Assembled once by the builder, then read-only: the diff engine never
/// mutates its inputs. Nodes are kept in a BTreeMap so iteration order (and
/// serialized output) is deterministic across rebuilds.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    pub system_name: String,
    pub created_at: DateTime<Utc>,
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    pub layers: Vec<Layer>,
    pub bounded_contexts: Vec<BoundedContext>,
    pub coupling_score: Option<f64>,
    pub cohesion_score: Option<f64>,
    claim_counter: u32,
}

impl KnowledgeGraph {
    pub fn new(system_name: impl Into<String>) -> Self {
        let system_name = system_name.into();
        let system_name = if system_name.is_empty() {
            "System".to_string()
        } else {
            system_name
        };
        Self {
            system_name,
            created_at: Utc::now(),
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            layers: Vec::new(),
            bounded_contexts: Vec::new(),
            coupling_score: None,
            cohesion_score: None,
            claim_counter: 0,
        }
    }

    /// Sequential claim ids for evidence anchoring, unique within one graph.
    pub fn next_claim_id(&mut self) -> String {
        self.claim_counter += 1;
        format!("claim_{:04}", self.claim_counter)
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Add an edge, materializing an `External` placeholder for any endpoint
    /// that is not yet a node. The graph is always total: no dangling edges.
    pub fn add_edge(&mut self, edge: Edge) {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                let placeholder =
                    Node::new(endpoint.clone(), NodeKind::External, endpoint.0.clone());
                self.nodes.insert(endpoint.clone(), placeholder);
            }
        }
        self.edges.push(edge);
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn add_bounded_context(&mut self, context: BoundedContext) {
        self.bounded_contexts.push(context);
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.kind == kind).collect()
    }

    pub fn outgoing_edges(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.source == id).collect()
    }

    pub fn incoming_edges(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.target == id).collect()
    }

    /// Strongly connected components with more than one member, i.e. groups
    /// of components that depend on each other in a cycle. Members within a
    /// cycle are sorted; cycles are ordered by their first member.
    pub fn dependency_cycles(&self) -> Vec<Vec<NodeId>> {
        let mut graph = petgraph::graph::DiGraph::<&NodeId, ()>::new();
        let mut indices = BTreeMap::new();
        for id in self.nodes.keys() {
            indices.insert(id, graph.add_node(id));
        }
        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (indices.get(&edge.source), indices.get(&edge.target)) {
                graph.add_edge(a, b, ());
            }
        }

        let mut cycles: Vec<Vec<NodeId>> = petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<NodeId> =
                    scc.into_iter().map(|ix| graph[ix].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Flatten into the serializable wire form.
    pub fn to_document(&self) -> GraphDocument<'_> {
        GraphDocument {
            system_name: &self.system_name,
            created_at: self.created_at,
            nodes: self.nodes.values().collect(),
            edges: &self.edges,
            layers: &self.layers,
            bounded_contexts: &self.bounded_contexts,
            coupling_score: self.coupling_score,
            cohesion_score: self.cohesion_score,
            stats: GraphStats {
                total_nodes: self.nodes.len(),
                total_edges: self.edges.len(),
            },
        }
    }
}

/// Serializable view of a [`KnowledgeGraph`].
#[derive(Debug, Serialize)]
pub struct GraphDocument<'a> {
    pub system_name: &'a str,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<&'a Node>,
    pub edges: &'a [Edge],
    pub layers: &'a [Layer],
    pub bounded_contexts: &'a [BoundedContext],
    pub coupling_score: Option<f64>,
    pub cohesion_score: Option<f64>,
    pub stats: GraphStats,
}

#[derive(Debug, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Relation;

    fn class_node(id: &str, name: &str) -> Node {
        Node::new(NodeId(id.to_string()), NodeKind::Class, name)
    }

    #[test]
    fn test_add_edge_materializes_missing_target() {
        let mut graph = KnowledgeGraph::new("test");
        graph.add_node(class_node("a.py:A", "A"));
        graph.add_edge(Edge::new(
            NodeId("a.py:A".into()),
            NodeId("requests".into()),
            Relation::Imports,
        ));

        let placeholder = graph.node(&NodeId("requests".into())).unwrap();
        assert_eq!(placeholder.kind, NodeKind::External);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_edge_totality() {
        let mut graph = KnowledgeGraph::new("test");
        graph.add_node(class_node("a.py:A", "A"));
        graph.add_edge(Edge::new(
            NodeId("a.py:A".into()),
            NodeId("b.py:B".into()),
            Relation::DependsOn,
        ));
        graph.add_edge(Edge::new(
            NodeId("ghost".into()),
            NodeId("a.py:A".into()),
            Relation::Uses,
        ));

        for edge in graph.edges() {
            assert!(graph.contains_node(&edge.source));
            assert!(graph.contains_node(&edge.target));
        }
    }

    #[test]
    fn test_claim_ids_sequential() {
        let mut graph = KnowledgeGraph::new("test");
        assert_eq!(graph.next_claim_id(), "claim_0001");
        assert_eq!(graph.next_claim_id(), "claim_0002");
    }

    #[test]
    fn test_empty_system_name_falls_back() {
        let graph = KnowledgeGraph::new("");
        assert_eq!(graph.system_name, "System");
    }

    #[test]
    fn test_nodes_by_kind() {
        let mut graph = KnowledgeGraph::new("test");
        graph.add_node(class_node("a.py:A", "A"));
        graph.add_node(Node::new(
            NodeId("ext".into()),
            NodeKind::External,
            "requests",
        ));
        assert_eq!(graph.nodes_by_kind(NodeKind::Class).len(), 1);
        assert_eq!(graph.nodes_by_kind(NodeKind::External).len(), 1);
    }

    #[test]
    fn test_dependency_cycles() {
        let mut graph = KnowledgeGraph::new("test");
        graph.add_node(class_node("a.py:A", "A"));
        graph.add_node(class_node("b.py:B", "B"));
        graph.add_node(class_node("c.py:C", "C"));
        graph.add_edge(Edge::new(
            NodeId("a.py:A".into()),
            NodeId("b.py:B".into()),
            Relation::DependsOn,
        ));
        graph.add_edge(Edge::new(
            NodeId("b.py:B".into()),
            NodeId("a.py:A".into()),
            Relation::DependsOn,
        ));
        graph.add_edge(Edge::new(
            NodeId("b.py:B".into()),
            NodeId("c.py:C".into()),
            Relation::DependsOn,
        ));

        let cycles = graph.dependency_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0],
            vec![NodeId("a.py:A".into()), NodeId("b.py:B".into())]
        );
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let mut graph = KnowledgeGraph::new("test");
        graph.add_node(class_node("a.py:A", "A"));
        graph.add_edge(Edge::new(
            NodeId("a.py:A".into()),
            NodeId("b.py:B".into()),
            Relation::DependsOn,
        ));
        assert!(graph.dependency_cycles().is_empty());
    }

    #[test]
    fn test_document_serializes_wire_shape() {
        let mut graph = KnowledgeGraph::new("demo");
        graph.add_node(class_node("a.py:A", "A"));
        let json = serde_json::to_value(graph.to_document()).unwrap();
        assert_eq!(json["system_name"], "demo");
        assert!(json["nodes"].is_array());
        assert!(json["edges"].is_array());
        assert_eq!(json["stats"]["total_nodes"], 1);
    }
}
