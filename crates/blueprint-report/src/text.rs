use blueprint_core::builder::ParseStats;
use blueprint_core::diff::{ChangeKind, GraphDiff, RiskLevel};
use blueprint_core::graph::KnowledgeGraph;
use colored::Colorize;

/// Human-readable summary of one assembled graph.
pub fn graph_summary(graph: &KnowledgeGraph, stats: &ParseStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", graph.system_name.bold()));
    out.push_str(&format!(
        "  {} nodes, {} edges\n",
        graph.node_count(),
        graph.edge_count()
    ));
    out.push_str(&format!(
        "  {} files parsed ({} classes, {} functions, {} imports)\n",
        stats.files_parsed, stats.classes_found, stats.functions_found, stats.imports_found
    ));

    if !stats.languages.is_empty() {
        let langs: Vec<String> = stats
            .languages
            .iter()
            .map(|(lang, count)| format!("{lang}: {count}"))
            .collect();
        out.push_str(&format!("  languages: {}\n", langs.join(", ")));
    }

    for layer in &graph.layers {
        out.push_str(&format!(
            "  {} {} component(s)\n",
            format!("[{}]", layer.name).cyan(),
            layer.components.len()
        ));
    }

    if !graph.bounded_contexts.is_empty() {
        let names: Vec<&str> = graph
            .bounded_contexts
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        out.push_str(&format!("  contexts: {}\n", names.join(", ")));
    }

    let cycles = graph.dependency_cycles();
    if !cycles.is_empty() {
        out.push_str(&format!(
            "  {} {} circular dependency group(s)\n",
            "warning:".yellow().bold(),
            cycles.len()
        ));
        for cycle in &cycles {
            let members: Vec<&str> = cycle.iter().map(|id| id.0.as_str()).collect();
            out.push_str(&format!("    {}\n", members.join(" <-> ")));
        }
    }

    out
}

/// Human-readable diff report.
pub fn diff_report(diff: &GraphDiff) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {}\n",
        diff.base_ref.bold(),
        "->".dimmed(),
        diff.target_ref.bold()
    ));
    out.push_str(&format!("{}\n", diff.summary));
    out.push_str(&format!("risk: {}\n", risk_label(diff.risk_level)));

    if !diff.breaking_changes.is_empty() {
        out.push_str(&format!("\n{}\n", "Breaking changes".red().bold()));
        for breaking in &diff.breaking_changes {
            out.push_str(&format!("  {} {}\n", "!".red(), breaking));
        }
    }

    if !diff.node_changes.is_empty() {
        out.push_str(&format!("\n{}\n", "Components".bold()));
        for change in &diff.node_changes {
            let marker = change_marker(change.kind);
            let detail = if change.details.is_empty() {
                String::new()
            } else {
                format!(" ({})", change.details)
            };
            out.push_str(&format!(
                "  {marker} {} [{}]{detail}\n",
                change.node_name, change.impact
            ));
        }
    }

    if !diff.edge_changes.is_empty() {
        out.push_str(&format!("\n{}\n", "Dependencies".bold()));
        for change in &diff.edge_changes {
            out.push_str(&format!(
                "  {} {} {} {}\n",
                change_marker(change.kind),
                change.source.0,
                "->".dimmed(),
                change.target.0
            ));
        }
    }

    if !diff.layer_changes.is_empty() {
        out.push_str(&format!("\n{}\n", "Layers".bold()));
        for change in &diff.layer_changes {
            out.push_str(&format!(
                "  {} {}: +{} -{}\n",
                change_marker(change.kind),
                change.layer_name,
                change.added_components.len(),
                change.removed_components.len()
            ));
        }
    }

    if !diff.context_changes.is_empty() {
        out.push_str(&format!("\n{}\n", "Bounded contexts".bold()));
        for change in &diff.context_changes {
            out.push_str(&format!(
                "  {} {}: +{} -{}\n",
                change_marker(change.kind),
                change.context_name,
                change.added_entities.len(),
                change.removed_entities.len()
            ));
        }
    }

    out
}

fn change_marker(kind: ChangeKind) -> colored::ColoredString {
    match kind {
        ChangeKind::Added => "+".green(),
        ChangeKind::Removed => "-".red(),
        ChangeKind::Modified => "~".yellow(),
    }
}

fn risk_label(risk: RiskLevel) -> colored::ColoredString {
    match risk {
        RiskLevel::Low => "low".green(),
        RiskLevel::Medium => "medium".yellow(),
        RiskLevel::High => "high".red(),
        RiskLevel::Critical => "critical".red().bold(),
    }
}
