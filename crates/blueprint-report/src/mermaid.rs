use std::collections::BTreeSet;

use blueprint_core::diff::{ChangeKind, GraphDiff};
use blueprint_core::graph::KnowledgeGraph;
use blueprint_core::types::{NodeKind, Relation};
use sha2::{Digest, Sha256};

const MAX_DIAGRAM_NODES: usize = 30;

/// Render the graph as a Mermaid flowchart. Output is capped at
/// `MAX_DIAGRAM_NODES` nodes; edges with a hidden endpoint are dropped.
pub fn graph_flowchart(graph: &KnowledgeGraph) -> String {
    let mut lines = vec!["flowchart TD".to_string()];

    let shown: Vec<_> = graph.nodes().take(MAX_DIAGRAM_NODES).collect();
    let shown_ids: BTreeSet<&str> = shown.iter().map(|n| n.id.0.as_str()).collect();

    for node in &shown {
        let (open, close) = node_shape(node.kind);
        let safe_name = node.name.replace('"', "'");
        lines.push(format!(
            "    {}{open}\"{safe_name}\"{close}",
            mermaid_id(&node.id.0)
        ));
    }

    for edge in graph.edges() {
        if shown_ids.contains(edge.source.0.as_str()) && shown_ids.contains(edge.target.0.as_str())
        {
            lines.push(format!(
                "    {} {}|{}| {}",
                mermaid_id(&edge.source.0),
                relation_arrow(edge.relation),
                edge.relation,
                mermaid_id(&edge.target.0)
            ));
        }
    }

    lines.join("\n")
}

/// Render a diff as a Mermaid flowchart with added/removed/modified styling.
pub fn diff_flowchart(diff: &GraphDiff) -> String {
    let mut lines = vec![
        "flowchart TD".to_string(),
        "    %% Blueprint Diff Visualization".to_string(),
        format!("    %% {} -> {}", diff.base_ref, diff.target_ref),
        String::new(),
        "    classDef added fill:#22c55e,stroke:#16a34a,color:#fff".to_string(),
        "    classDef removed fill:#ef4444,stroke:#dc2626,color:#fff".to_string(),
        "    classDef modified fill:#f59e0b,stroke:#d97706,color:#fff".to_string(),
        String::new(),
    ];

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();

    for change in diff.node_changes.iter().take(MAX_DIAGRAM_NODES) {
        let safe_name: String = change.node_name.replace('"', "'").chars().take(30).collect();
        let id = mermaid_id(&change.node_id.0);
        match change.kind {
            ChangeKind::Added => {
                lines.push(format!("    {id}[\"+{safe_name}\"]"));
                added.push(id);
            }
            ChangeKind::Removed => {
                lines.push(format!("    {id}[\"-{safe_name}\"]"));
                removed.push(id);
            }
            ChangeKind::Modified => {
                lines.push(format!("    {id}[\"~{safe_name}\"]"));
                modified.push(id);
            }
        }
    }

    if !added.is_empty() {
        lines.push(format!("    class {} added", added.join(",")));
    }
    if !removed.is_empty() {
        lines.push(format!("    class {} removed", removed.join(",")));
    }
    if !modified.is_empty() {
        lines.push(format!("    class {} modified", modified.join(",")));
    }

    lines.join("\n")
}

/// Stable Mermaid-safe identifier derived from the node id.
fn mermaid_id(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("n_{hex}")
}

fn node_shape(kind: NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Module => ("[[", "]]"),
        NodeKind::Class => ("[", "]"),
        NodeKind::Function => ("([", "])"),
        NodeKind::Service => ("{{", "}}"),
        NodeKind::Database => ("[(", ")]"),
        NodeKind::External => (">", "]"),
        NodeKind::Config => ("[/", "/]"),
    }
}

fn relation_arrow(relation: Relation) -> &'static str {
    match relation {
        Relation::Imports | Relation::DependsOn | Relation::Produces => "-->",
        Relation::Calls | Relation::Uses => "-.->",
        Relation::Inherits => "==>",
        Relation::Contains => "--o",
        Relation::Consumes => "<--",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::diff::DiffEngine;
    use blueprint_core::types::{Edge, Node, NodeId};

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new("demo");
        graph.add_node(Node::new(
            NodeId::in_file("a.py", "Api"),
            NodeKind::Class,
            "Api",
        ));
        graph.add_node(Node::new(
            NodeId::in_file("b.py", "Store"),
            NodeKind::Class,
            "Store",
        ));
        graph.add_edge(Edge::new(
            NodeId::in_file("a.py", "Api"),
            NodeId::in_file("b.py", "Store"),
            Relation::DependsOn,
        ));
        graph
    }

    #[test]
    fn test_flowchart_structure() {
        let chart = graph_flowchart(&sample_graph());
        assert!(chart.starts_with("flowchart TD"));
        assert!(chart.contains("\"Api\""));
        assert!(chart.contains("-->|depends_on|"));
        // Raw path-based ids never leak into the diagram.
        assert!(!chart.contains("a.py:Api"));
    }

    #[test]
    fn test_diff_flowchart_styles() {
        let base = KnowledgeGraph::new("demo");
        let target = sample_graph();
        let diff = DiffEngine::new().compare(&base, &target, "main", "feature");

        let chart = diff_flowchart(&diff);
        assert!(chart.contains("classDef added"));
        assert!(chart.contains("[\"+Api\"]"));
        assert!(chart.contains(" added"));
        assert!(!chart.contains("classDef removed\n    class"));
    }

    #[test]
    fn test_mermaid_id_is_stable() {
        assert_eq!(mermaid_id("a.py:Api"), mermaid_id("a.py:Api"));
        assert_ne!(mermaid_id("a.py:Api"), mermaid_id("b.py:Store"));
    }
}
