pub mod builder;
pub mod config;
pub mod context;
pub mod diff;
pub mod fallback;
pub mod graph;
pub mod index;
pub mod layer;
pub mod parser;
pub mod resolve;
pub mod types;

pub use builder::{BuildOutput, GraphAssembler, ParseStats};
pub use config::Config;
pub use diff::{DiffEngine, GraphDiff, RiskLevel};
pub use graph::KnowledgeGraph;
pub use layer::{LayerClassifier, LayerKind};
pub use parser::{ParsedFile, SourceParser};
pub use types::*;
