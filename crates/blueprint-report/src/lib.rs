pub mod json;
pub mod mermaid;
pub mod text;

pub use json::{diff_to_json, graph_to_json};
pub use mermaid::{diff_flowchart, graph_flowchart};
pub use text::{diff_report, graph_summary};
