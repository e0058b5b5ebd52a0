use std::path::Path;

use blueprint_core::builder::GraphAssembler;
use blueprint_core::config::Config;
use blueprint_core::diff::{DiffEngine, RiskLevel};
use blueprint_core::parser::SourceParser;
use blueprint_core::types::{NodeId, NodeKind};
use blueprint_go::GoParser;
use blueprint_python::PythonParser;
use blueprint_typescript::TypeScriptParser;

fn parsers() -> Vec<Box<dyn SourceParser>> {
    vec![
        Box::new(PythonParser::new().unwrap()),
        Box::new(TypeScriptParser::new().unwrap()),
        Box::new(GoParser::new().unwrap()),
    ]
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn polyglot_fixture(root: &Path) {
    write(
        root,
        "orders/api/routes.py",
        "from orders.services import order_service\n\nclass OrderRoutes:\n    def create(self):\n        pass\n",
    );
    write(
        root,
        "orders/services/order_service.py",
        "from orders.models import order\n\nclass OrderService:\n    def place(self):\n        pass\n",
    );
    write(root, "orders/models/order.py", "class Order:\n    pass\n");
    write(
        root,
        "web/src/pages/Checkout.tsx",
        "import React from 'react';\n\nexport class CheckoutPage extends React.Component {\n}\n",
    );
    write(
        root,
        "gateway/server.go",
        "package gateway\n\ntype Gateway struct {}\n\nfunc (g *Gateway) Run() {}\n",
    );
}

#[test]
fn test_polyglot_build() {
    let tmp = tempfile::tempdir().unwrap();
    polyglot_fixture(tmp.path());

    let output = GraphAssembler::new(parsers(), Config::default())
        .build(tmp.path())
        .unwrap();

    assert_eq!(output.stats.files_parsed, 5);
    assert_eq!(output.stats.languages.get("python"), Some(&3));
    assert_eq!(output.stats.languages.get("tsx"), Some(&1));
    assert_eq!(output.stats.languages.get("go"), Some(&1));

    // The python import chain resolves into depends_on edges.
    let routes = NodeId::in_file("orders/api/routes.py", "OrderRoutes");
    let service = NodeId::in_file("orders/services/order_service.py", "OrderService");
    assert!(output.graph.contains_node(&routes));
    assert_eq!(output.graph.outgoing_edges(&routes).len(), 1);
    assert_eq!(output.graph.outgoing_edges(&service).len(), 1);

    // Every module lands in exactly one layer.
    let layered: usize = output.graph.layers.iter().map(|l| l.components.len()).sum();
    assert_eq!(layered, 5);

    // Contexts come from top-level directories.
    let contexts: Vec<&str> = output
        .graph
        .bounded_contexts
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(contexts, vec!["Gateway", "Orders", "Web"]);
}

#[test]
fn test_snapshot_diff_detects_breaking_removal() {
    let base_dir = tempfile::tempdir().unwrap();
    let target_dir = tempfile::tempdir().unwrap();
    polyglot_fixture(base_dir.path());

    // Target drops the API routes module and grows the service.
    polyglot_fixture(target_dir.path());
    std::fs::remove_file(target_dir.path().join("orders/api/routes.py")).unwrap();
    write(
        target_dir.path(),
        "orders/services/order_service.py",
        "from orders.models import order\n\nclass OrderService:\n    def place(self):\n        pass\n\n    def cancel(self):\n        pass\n",
    );

    let base = GraphAssembler::new(parsers(), Config::default())
        .build(base_dir.path())
        .unwrap();
    let target = GraphAssembler::new(parsers(), Config::default())
        .build(target_dir.path())
        .unwrap();

    let diff = DiffEngine::new().compare(&base.graph, &target.graph, "main", "feature");

    // The removed routes class is API-facing, so its removal is breaking.
    assert!(diff
        .breaking_changes
        .iter()
        .any(|b| b.contains("OrderRoutes")));
    assert!(diff.removed_count() >= 1);
    assert!(diff.modified_count() >= 1);
    assert!(diff.summary.starts_with("Architecture changes:"));
    assert!(diff.risk_level >= RiskLevel::Low);
}

#[test]
fn test_identical_snapshots_have_empty_diff() {
    let dir = tempfile::tempdir().unwrap();
    polyglot_fixture(dir.path());

    let first = GraphAssembler::new(parsers(), Config::default())
        .build(dir.path())
        .unwrap();
    let second = GraphAssembler::new(parsers(), Config::default())
        .build(dir.path())
        .unwrap();

    let diff = DiffEngine::new().compare(&first.graph, &second.graph, "a", "a");
    assert_eq!(diff.total_changes(), 0);
    assert_eq!(diff.summary, "No architectural changes detected");
}

#[test]
fn test_unreadable_syntax_does_not_abort_build() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ok.py", "class Fine:\n    pass\n");
    write(dir.path(), "broken.py", "class Broken(\n  def x(:\n");

    let output = GraphAssembler::new(parsers(), Config::default())
        .build(dir.path())
        .unwrap();

    assert_eq!(output.stats.files_parsed, 2);
    assert!(output
        .graph
        .contains_node(&NodeId::in_file("ok.py", "Fine")));
}

#[test]
fn test_external_placeholders_stay_external() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app/a.py",
        "from app import b\n\nclass A:\n    pass\n",
    );
    write(dir.path(), "app/b.py", "class B:\n    pass\n");

    let output = GraphAssembler::new(parsers(), Config::default())
        .build(dir.path())
        .unwrap();

    // All edges resolve internally here, so no external nodes exist.
    assert!(output.graph.nodes_by_kind(NodeKind::External).is_empty());
}
