use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of a node in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Module,
    Class,
    Function,
    Service,
    Database,
    External,
    Config,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Module => write!(f, "module"),
            NodeKind::Class => write!(f, "class"),
            NodeKind::Function => write!(f, "function"),
            NodeKind::Service => write!(f, "service"),
            NodeKind::Database => write!(f, "database"),
            NodeKind::External => write!(f, "external"),
            NodeKind::Config => write!(f, "config"),
        }
    }
}

/// Relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Imports,
    Calls,
    Inherits,
    DependsOn,
    Contains,
    Uses,
    Produces,
    Consumes,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Imports => write!(f, "imports"),
            Relation::Calls => write!(f, "calls"),
            Relation::Inherits => write!(f, "inherits"),
            Relation::DependsOn => write!(f, "depends_on"),
            Relation::Contains => write!(f, "contains"),
            Relation::Uses => write!(f, "uses"),
            Relation::Produces => write!(f, "produces"),
            Relation::Consumes => write!(f, "consumes"),
        }
    }
}

/// Confidence attached to a piece of evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    High,
    Medium,
    Low,
}

/// Unique identifier for a node.
///
/// Ids must be reproducible from identical input across independent builds,
/// since cross-snapshot diffing compares id sets. Symbols declared in a file
/// use `"<file>:<Name>"`; synthesized nodes (externals, modules without a
/// file) use a truncated sha256 of `"<kind>:<name>"`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn in_file(file: &str, name: &str) -> Self {
        Self(format!("{file}:{name}"))
    }

    pub fn derived(kind: NodeKind, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{kind}:{name}").as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..12].to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const MAX_QUOTE_LEN: usize = 200;

/// Evidence anchoring a graph claim to a file and line range.
///
/// Line ranges are 1-indexed and inclusive. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub claim_id: String,
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
    pub quote: String,
    pub confidence: Confidence,
}

impl Evidence {
    /// Build evidence. A malformed line range (zero start, or end before
    /// start) defaults to (1, 1) rather than failing; quotes are capped at
    /// 200 characters.
    pub fn new(
        claim_id: impl Into<String>,
        file_path: impl Into<String>,
        line_start: usize,
        line_end: usize,
        quote: &str,
        confidence: Confidence,
    ) -> Self {
        let (line_start, line_end) = if line_start == 0 || line_end < line_start {
            (1, 1)
        } else {
            (line_start, line_end)
        };
        let quote = if quote.len() > MAX_QUOTE_LEN {
            let mut cut = MAX_QUOTE_LEN;
            while !quote.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &quote[..cut])
        } else {
            quote.to_string()
        };
        Self {
            claim_id: claim_id.into(),
            file_path: file_path.into(),
            line_start,
            line_end,
            quote,
            confidence,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_range: Option<(usize, usize)>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            file_path: None,
            line_range: None,
            description: None,
            evidence: Vec::new(),
        }
    }
}

/// An edge in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub evidence: Option<Evidence>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, relation: Relation) -> Self {
        Self {
            source,
            target,
            relation,
            weight: 1.0,
            evidence: None,
        }
    }
}

/// A Domain-Driven Design bounded context: modules grouped under one
/// top-level domain directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundedContext {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub primary_files: Vec<String>,
    #[serde(default)]
    pub key_entities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// An architectural layer and the module paths assigned to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub components: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_in_file() {
        let id = NodeId::in_file("app/users.py", "UserService");
        assert_eq!(id.0, "app/users.py:UserService");
    }

    #[test]
    fn test_node_id_derived_deterministic() {
        let a = NodeId::derived(NodeKind::External, "requests");
        let b = NodeId::derived(NodeKind::External, "requests");
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 12);

        let c = NodeId::derived(NodeKind::Module, "requests");
        assert_ne!(a, c, "kind participates in the id");
    }

    #[test]
    fn test_evidence_defensive_line_range() {
        let ev = Evidence::new("c1", "a.py", 0, 5, "x", Confidence::High);
        assert_eq!((ev.line_start, ev.line_end), (1, 1));

        let ev = Evidence::new("c2", "a.py", 9, 3, "x", Confidence::High);
        assert_eq!((ev.line_start, ev.line_end), (1, 1));

        let ev = Evidence::new("c3", "a.py", 3, 9, "x", Confidence::High);
        assert_eq!((ev.line_start, ev.line_end), (3, 9));
    }

    #[test]
    fn test_evidence_quote_truncated() {
        let long = "x".repeat(500);
        let ev = Evidence::new("c1", "a.py", 1, 1, &long, Confidence::Low);
        assert_eq!(ev.quote.len(), 203);
        assert!(ev.quote.ends_with("..."));
    }

    #[test]
    fn test_relation_serializes_snake_case() {
        let json = serde_json::to_string(&Relation::DependsOn).unwrap();
        assert_eq!(json, "\"depends_on\"");
    }

    #[test]
    fn test_node_kind_serializes_as_type() {
        let node = Node::new(NodeId("n1".into()), NodeKind::Class, "User");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "class");
        assert_eq!(json["name"], "User");
    }
}
