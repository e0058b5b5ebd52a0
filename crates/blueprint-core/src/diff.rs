use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::KnowledgeGraph;
use crate::types::{Node, NodeId, NodeKind, Relation};

/// Name and path fragments that mark a component as externally visible.
const HIGH_IMPACT_PATTERNS: &[&str] = &[
    "api",
    "interface",
    "public",
    "export",
    "handler",
    "controller",
    "endpoint",
    "route",
    "schema",
];

/// Fragments in an edge target that make its removal a breaking change.
const BREAKING_TARGET_PATTERNS: &[&str] = &["api", "public", "export"];

const MAX_LISTED_COMPONENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
        };
        f.write_str(label)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeChange {
    #[serde(rename = "change_type")]
    pub kind: ChangeKind,
    pub node_id: NodeId,
    pub node_name: String,
    #[serde(rename = "node_type")]
    pub node_kind: NodeKind,
    pub file_path: Option<String>,
    pub old_line_range: Option<(usize, usize)>,
    pub new_line_range: Option<(usize, usize)>,
    pub details: String,
    pub impact: Impact,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeChange {
    #[serde(rename = "change_type")]
    pub kind: ChangeKind,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerChange {
    #[serde(rename = "change_type")]
    pub kind: ChangeKind,
    pub layer_name: String,
    pub added_components: Vec<String>,
    pub removed_components: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextChange {
    #[serde(rename = "change_type")]
    pub kind: ChangeKind,
    pub context_name: String,
    pub added_entities: Vec<String>,
    pub removed_entities: Vec<String>,
}

/// Complete structural diff between two graph snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct GraphDiff {
    pub base_ref: String,
    pub target_ref: String,
    pub base_timestamp: DateTime<Utc>,
    pub target_timestamp: DateTime<Utc>,
    pub node_changes: Vec<NodeChange>,
    pub edge_changes: Vec<EdgeChange>,
    pub layer_changes: Vec<LayerChange>,
    pub context_changes: Vec<ContextChange>,
    pub summary: String,
    pub risk_level: RiskLevel,
    pub breaking_changes: Vec<String>,
}

impl GraphDiff {
    pub fn total_changes(&self) -> usize {
        self.node_changes.len() + self.edge_changes.len()
    }

    pub fn added_count(&self) -> usize {
        self.count_nodes(ChangeKind::Added)
    }

    pub fn removed_count(&self) -> usize {
        self.count_nodes(ChangeKind::Removed)
    }

    pub fn modified_count(&self) -> usize {
        self.count_nodes(ChangeKind::Modified)
    }

    fn count_nodes(&self, kind: ChangeKind) -> usize {
        self.node_changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Compares two [`KnowledgeGraph`] snapshots.
///
/// Both inputs are read-only; the comparison itself never parses source or
/// touches the filesystem. Change lists are emitted in a fixed order (added,
/// removed, modified, each sorted by id) so identical inputs produce
/// identical diffs.
#[derive(Debug, Default)]
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(
        &self,
        base: &KnowledgeGraph,
        target: &KnowledgeGraph,
        base_ref: &str,
        target_ref: &str,
    ) -> GraphDiff {
        let mut diff = GraphDiff {
            base_ref: base_ref.to_string(),
            target_ref: target_ref.to_string(),
            base_timestamp: base.created_at,
            target_timestamp: target.created_at,
            node_changes: self.compare_nodes(base, target),
            edge_changes: self.compare_edges(base, target),
            layer_changes: self.compare_layers(base, target),
            context_changes: self.compare_contexts(base, target),
            summary: String::new(),
            risk_level: RiskLevel::Low,
            breaking_changes: Vec::new(),
        };
        self.analyze_risk(&mut diff);
        diff.summary = self.summarize(&diff);
        diff
    }

    fn compare_nodes(&self, base: &KnowledgeGraph, target: &KnowledgeGraph) -> Vec<NodeChange> {
        let base_ids: BTreeSet<&NodeId> = base.node_ids().collect();
        let target_ids: BTreeSet<&NodeId> = target.node_ids().collect();
        let mut changes = Vec::new();

        for id in target_ids.difference(&base_ids) {
            let node = target.node(id).unwrap();
            changes.push(NodeChange {
                kind: ChangeKind::Added,
                node_id: (*id).clone(),
                node_name: node.name.clone(),
                node_kind: node.kind,
                file_path: node.file_path.clone(),
                old_line_range: None,
                new_line_range: node.line_range,
                details: format!("New {} added", node.kind),
                impact: assess_impact(node),
            });
        }

        for id in base_ids.difference(&target_ids) {
            let node = base.node(id).unwrap();
            changes.push(NodeChange {
                kind: ChangeKind::Removed,
                node_id: (*id).clone(),
                node_name: node.name.clone(),
                node_kind: node.kind,
                file_path: node.file_path.clone(),
                old_line_range: node.line_range,
                new_line_range: None,
                details: format!("{} removed", node.kind),
                impact: assess_impact(node),
            });
        }

        for id in base_ids.intersection(&target_ids) {
            let base_node = base.node(id).unwrap();
            let target_node = target.node(id).unwrap();
            if nodes_differ(base_node, target_node) {
                changes.push(NodeChange {
                    kind: ChangeKind::Modified,
                    node_id: (*id).clone(),
                    node_name: target_node.name.clone(),
                    node_kind: target_node.kind,
                    file_path: target_node.file_path.clone(),
                    old_line_range: base_node.line_range,
                    new_line_range: target_node.line_range,
                    details: describe_modification(base_node, target_node),
                    impact: assess_impact(target_node),
                });
            }
        }

        changes
    }

    fn compare_edges(&self, base: &KnowledgeGraph, target: &KnowledgeGraph) -> Vec<EdgeChange> {
        let edge_map = |graph: &KnowledgeGraph| -> BTreeMap<String, (NodeId, NodeId, Relation)> {
            graph
                .edges()
                .iter()
                .map(|e| {
                    (
                        format!("{}|{}|{}", e.source.0, e.target.0, e.relation),
                        (e.source.clone(), e.target.clone(), e.relation),
                    )
                })
                .collect()
        };

        let base_edges = edge_map(base);
        let target_edges = edge_map(target);
        let mut changes = Vec::new();

        for (key, (source, target_id, relation)) in &target_edges {
            if !base_edges.contains_key(key) {
                changes.push(EdgeChange {
                    kind: ChangeKind::Added,
                    source: source.clone(),
                    target: target_id.clone(),
                    relation: *relation,
                    details: format!("New {relation} dependency added"),
                });
            }
        }

        for (key, (source, target_id, relation)) in &base_edges {
            if !target_edges.contains_key(key) {
                changes.push(EdgeChange {
                    kind: ChangeKind::Removed,
                    source: source.clone(),
                    target: target_id.clone(),
                    relation: *relation,
                    details: format!("{relation} dependency removed"),
                });
            }
        }

        changes
    }

    fn compare_layers(&self, base: &KnowledgeGraph, target: &KnowledgeGraph) -> Vec<LayerChange> {
        fn layer_map<'a>(graph: &'a KnowledgeGraph) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
            graph
                .layers
                .iter()
                .map(|l| {
                    (
                        l.name.as_str(),
                        l.components.iter().map(|c| c.as_str()).collect(),
                    )
                })
                .collect()
        }

        let base_layers = layer_map(base);
        let target_layers = layer_map(target);
        let all_names: BTreeSet<&str> = base_layers
            .keys()
            .chain(target_layers.keys())
            .copied()
            .collect();

        let mut changes = Vec::new();
        for name in all_names {
            let empty = BTreeSet::new();
            let base_comps = base_layers.get(name).unwrap_or(&empty);
            let target_comps = target_layers.get(name).unwrap_or(&empty);

            let added: Vec<String> = target_comps
                .difference(base_comps)
                .take(MAX_LISTED_COMPONENTS)
                .map(|c| c.to_string())
                .collect();
            let removed: Vec<String> = base_comps
                .difference(target_comps)
                .take(MAX_LISTED_COMPONENTS)
                .map(|c| c.to_string())
                .collect();

            if added.is_empty() && removed.is_empty() {
                continue;
            }

            let kind = if !base_layers.contains_key(name) {
                ChangeKind::Added
            } else if !target_layers.contains_key(name) {
                ChangeKind::Removed
            } else {
                ChangeKind::Modified
            };

            changes.push(LayerChange {
                kind,
                layer_name: name.to_string(),
                added_components: added,
                removed_components: removed,
            });
        }

        changes
    }

    fn compare_contexts(
        &self,
        base: &KnowledgeGraph,
        target: &KnowledgeGraph,
    ) -> Vec<ContextChange> {
        fn context_map<'a>(graph: &'a KnowledgeGraph) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
            graph
                .bounded_contexts
                .iter()
                .map(|c| {
                    (
                        c.name.as_str(),
                        c.key_entities.iter().map(|e| e.as_str()).collect(),
                    )
                })
                .collect()
        }

        let base_contexts = context_map(base);
        let target_contexts = context_map(target);
        let all_names: BTreeSet<&str> = base_contexts
            .keys()
            .chain(target_contexts.keys())
            .copied()
            .collect();

        let mut changes = Vec::new();
        for name in all_names {
            let empty = BTreeSet::new();
            let base_entities = base_contexts.get(name).unwrap_or(&empty);
            let target_entities = target_contexts.get(name).unwrap_or(&empty);

            let added: Vec<String> = target_entities
                .difference(base_entities)
                .take(MAX_LISTED_COMPONENTS)
                .map(|e| e.to_string())
                .collect();
            let removed: Vec<String> = base_entities
                .difference(target_entities)
                .take(MAX_LISTED_COMPONENTS)
                .map(|e| e.to_string())
                .collect();

            if added.is_empty() && removed.is_empty() {
                continue;
            }

            let kind = if !base_contexts.contains_key(name) {
                ChangeKind::Added
            } else if !target_contexts.contains_key(name) {
                ChangeKind::Removed
            } else {
                ChangeKind::Modified
            };

            changes.push(ContextChange {
                kind,
                context_name: name.to_string(),
                added_entities: added,
                removed_entities: removed,
            });
        }

        changes
    }

    fn analyze_risk(&self, diff: &mut GraphDiff) {
        let high_impact: Vec<&NodeChange> = diff
            .node_changes
            .iter()
            .filter(|c| {
                c.impact == Impact::High
                    && matches!(c.kind, ChangeKind::Removed | ChangeKind::Modified)
            })
            .collect();

        let mut breaking = Vec::new();
        for change in &high_impact {
            if change.kind == ChangeKind::Removed {
                breaking.push(format!(
                    "Removed {} '{}' (potentially breaking)",
                    change.node_kind, change.node_name
                ));
            }
        }

        for edge_change in &diff.edge_changes {
            if edge_change.kind == ChangeKind::Removed {
                let target_lower = edge_change.target.0.to_lowercase();
                if BREAKING_TARGET_PATTERNS
                    .iter()
                    .any(|p| target_lower.contains(p))
                {
                    breaking.push(format!("Removed dependency to '{}'", edge_change.target.0));
                }
            }
        }

        diff.risk_level = if breaking.len() > 5 {
            RiskLevel::Critical
        } else if breaking.len() > 2 {
            RiskLevel::High
        } else if high_impact.len() > 3 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        diff.breaking_changes = breaking;
    }

    fn summarize(&self, diff: &GraphDiff) -> String {
        let mut parts = Vec::new();
        if diff.added_count() > 0 {
            parts.push(format!("{} components added", diff.added_count()));
        }
        if diff.removed_count() > 0 {
            parts.push(format!("{} components removed", diff.removed_count()));
        }
        if diff.modified_count() > 0 {
            parts.push(format!("{} components modified", diff.modified_count()));
        }

        if parts.is_empty() {
            return "No architectural changes detected".to_string();
        }

        let mut summary = format!("Architecture changes: {}.", parts.join(", "));
        if !diff.breaking_changes.is_empty() {
            summary.push_str(&format!(
                " {} potential breaking change(s).",
                diff.breaking_changes.len()
            ));
        }
        if !diff.layer_changes.is_empty() {
            summary.push_str(" Layer structure affected.");
        }
        summary
    }
}

fn nodes_differ(base: &Node, target: &Node) -> bool {
    base.kind != target.kind
        || base.file_path != target.file_path
        || base.line_range != target.line_range
}

fn describe_modification(base: &Node, target: &Node) -> String {
    let mut parts = Vec::new();

    if base.file_path != target.file_path {
        parts.push(format!(
            "moved from {} to {}",
            base.file_path.as_deref().unwrap_or("?"),
            target.file_path.as_deref().unwrap_or("?")
        ));
    }

    if base.line_range != target.line_range {
        if let (Some((b_start, b_end)), Some((t_start, t_end))) =
            (base.line_range, target.line_range)
        {
            let base_len = b_end as i64 - b_start as i64;
            let target_len = t_end as i64 - t_start as i64;
            let size_diff = target_len - base_len;
            if size_diff > 0 {
                parts.push(format!("expanded by {size_diff} lines"));
            } else if size_diff < 0 {
                parts.push(format!("reduced by {} lines", size_diff.abs()));
            } else {
                parts.push("position changed".to_string());
            }
        }
    }

    if parts.is_empty() {
        "content modified".to_string()
    } else {
        parts.join("; ")
    }
}

/// High for anything API-facing, medium for service classes, low otherwise.
fn assess_impact(node: &Node) -> Impact {
    let name_lower = node.name.to_lowercase();
    let path_lower = node
        .file_path
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    if HIGH_IMPACT_PATTERNS
        .iter()
        .any(|p| name_lower.contains(p) || path_lower.contains(p))
    {
        return Impact::High;
    }

    if node.kind == NodeKind::Class && name_lower.contains("service") {
        return Impact::Medium;
    }

    Impact::Low
}
