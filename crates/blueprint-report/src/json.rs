use anyhow::Result;
use blueprint_core::diff::GraphDiff;
use blueprint_core::graph::KnowledgeGraph;

/// Serialize a graph to JSON.
pub fn graph_to_json(graph: &KnowledgeGraph, pretty: bool) -> Result<String> {
    let document = graph.to_document();
    let json = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    Ok(json)
}

/// Serialize a diff to JSON, with aggregate stats alongside the change lists.
pub fn diff_to_json(diff: &GraphDiff, pretty: bool) -> Result<String> {
    let mut value = serde_json::to_value(diff)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "stats".to_string(),
            serde_json::json!({
                "total_changes": diff.total_changes(),
                "added": diff.added_count(),
                "removed": diff.removed_count(),
                "modified": diff.modified_count(),
            }),
        );
    }
    let json = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(json)
}
