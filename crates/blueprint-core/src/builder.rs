use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::context::ContextDetector;
use crate::graph::KnowledgeGraph;
use crate::index::ModuleIndex;
use crate::layer::LayerKind;
use crate::parser::{ParsedFile, SourceParser};
use crate::resolve::ImportResolver;
use crate::types::{Confidence, Edge, Evidence, Layer, Node, NodeId, NodeKind, Relation};

/// Callback invoked after each parsed file with (done, total).
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Counts gathered while assembling one graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStats {
    pub files_parsed: usize,
    pub classes_found: usize,
    pub functions_found: usize,
    pub imports_found: usize,
    /// Files per language, sorted by language name.
    pub languages: BTreeMap<String, usize>,
}

/// Result of one full assembly run.
pub struct BuildOutput {
    pub graph: KnowledgeGraph,
    pub index: ModuleIndex,
    pub stats: ParseStats,
}

/// Assembles a [`KnowledgeGraph`] from a source tree.
///
/// Files are parsed in parallel; everything after the parse phase (index
/// merge, node and edge construction, layer and context assignment) runs on
/// one thread so output is deterministic for identical input.
pub struct GraphAssembler {
    parsers: Vec<Box<dyn SourceParser>>,
    config: Config,
    progress: Option<ProgressFn>,
}

impl GraphAssembler {
    pub fn new(parsers: Vec<Box<dyn SourceParser>>, config: Config) -> Self {
        Self {
            parsers,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Build the knowledge graph for the repository at `root`.
    pub fn build(&self, root: &Path) -> Result<BuildOutput> {
        let excludes = build_exclude_set(&self.config.project.exclude_patterns)?;
        let files = self.discover_sources(root, &excludes);
        tracing::info!(files = files.len(), root = %root.display(), "assembling knowledge graph");

        let parsed = self.parse_all(root, &files);

        let mut index = ModuleIndex::new();
        let mut stats = ParseStats::default();
        for (rel_path, file) in &parsed {
            index.insert(rel_path, file);
            stats.files_parsed += 1;
            stats.classes_found += file.classes().count();
            stats.functions_found += file.functions().count();
            stats.imports_found += file.imports.len();
            *stats.languages.entry(file.language.clone()).or_default() += 1;
        }

        let system_name = self
            .config
            .project
            .name
            .clone()
            .unwrap_or_else(|| {
                root.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            });
        let mut graph = KnowledgeGraph::new(system_name);

        self.add_nodes(&mut graph, &parsed);
        self.add_dependency_edges(&mut graph, &index, &parsed);
        self.add_layers(&mut graph, &index);
        for context in ContextDetector::new().detect(&index) {
            graph.add_bounded_context(context);
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph assembled"
        );
        Ok(BuildOutput {
            graph,
            index,
            stats,
        })
    }

    /// Walk the tree and keep files a registered parser can handle.
    fn discover_sources(&self, root: &Path, excludes: &GlobSet) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                let rel = e.path().strip_prefix(root).unwrap_or(e.path());
                !excludes.is_match(rel)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.parser_for(e.path()).is_some())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    fn parser_for(&self, path: &Path) -> Option<&dyn SourceParser> {
        let ext = path.extension()?.to_str()?;
        let wanted = &self.config.project.languages;
        self.parsers
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| wanted.is_empty() || wanted.iter().any(|l| l == p.language()))
            .find(|p| p.file_extensions().contains(&ext))
    }

    /// Parse every file, in parallel. Unreadable files still produce a
    /// well-formed entry carrying the error.
    fn parse_all(&self, root: &Path, files: &[PathBuf]) -> Vec<(String, ParsedFile)> {
        let done = AtomicUsize::new(0);
        let total = files.len();
        // Each absolute path is parsed exactly once per build.
        let mut cache: HashMap<PathBuf, (String, ParsedFile)> = files
            .par_iter()
            .filter_map(|path| {
                let parser = self.parser_for(path)?;
                let rel_path = path
                    .strip_prefix(root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");

                let parsed = match std::fs::read_to_string(path) {
                    Ok(content) => parser.parse(Path::new(&rel_path), &content),
                    Err(e) => {
                        tracing::warn!("failed to read {}: {e}", path.display());
                        ParsedFile::with_error(rel_path.clone(), parser.language(), e.to_string())
                    }
                };

                if let Some(progress) = &self.progress {
                    progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                }
                Some((path.clone(), (rel_path, parsed)))
            })
            .collect();

        let mut results: Vec<(String, ParsedFile)> = cache.drain().map(|(_, v)| v).collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// One node per declared class or interface, with evidence anchored to
    /// the declaration.
    fn add_nodes(&self, graph: &mut KnowledgeGraph, parsed: &[(String, ParsedFile)]) {
        for (rel_path, file) in parsed {
            for symbol in file.classes() {
                let claim_id = graph.next_claim_id();
                let quote = symbol
                    .signature
                    .clone()
                    .unwrap_or_else(|| format!("class {}", symbol.name));
                let evidence = Evidence::new(
                    claim_id,
                    rel_path.clone(),
                    symbol.line_start,
                    symbol.line_end,
                    &quote,
                    Confidence::High,
                );

                let mut node = Node::new(
                    NodeId::in_file(rel_path, &symbol.name),
                    NodeKind::Class,
                    &symbol.name,
                );
                node.file_path = Some(rel_path.clone());
                node.line_range = Some((symbol.line_start, symbol.line_end));
                node.evidence.push(evidence);
                graph.add_node(node);
            }
        }
    }

    /// One `depends_on` edge per resolved import. The endpoint for a module
    /// is its first declared class; files without classes are represented by
    /// a module node named after the file stem.
    fn add_dependency_edges(
        &self,
        graph: &mut KnowledgeGraph,
        index: &ModuleIndex,
        parsed: &[(String, ParsedFile)],
    ) {
        let resolver = ImportResolver::new(index);

        for (rel_path, file) in parsed {
            for import in &file.imports {
                let Some(target_path) = resolver.resolve(rel_path, &import.module) else {
                    // Unresolved imports are external or stdlib; skip them.
                    continue;
                };
                if &target_path == rel_path {
                    continue;
                }

                let source = self.module_endpoint(graph, index, rel_path);
                let target = self.module_endpoint(graph, index, &target_path);

                let claim_id = graph.next_claim_id();
                let mut edge = Edge::new(source, target, Relation::DependsOn);
                edge.evidence = Some(Evidence::new(
                    claim_id,
                    rel_path.clone(),
                    import.line,
                    import.line,
                    &format!("import {}", import.module),
                    Confidence::Medium,
                ));
                graph.add_edge(edge);
            }
        }
    }

    /// Representative node for a module: its first declared class, else a
    /// module node named after the file stem (created on first use).
    fn module_endpoint(
        &self,
        graph: &mut KnowledgeGraph,
        index: &ModuleIndex,
        path: &str,
    ) -> NodeId {
        if let Some(info) = index.get(path) {
            if let Some(class) = info.classes.first() {
                return NodeId::in_file(path, class);
            }
        }
        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let id = NodeId::in_file(path, &stem);
        if !graph.contains_node(&id) {
            let mut node = Node::new(id.clone(), NodeKind::Module, &stem);
            node.file_path = Some(path.to_string());
            graph.add_node(node);
        }
        id
    }

    fn add_layers(&self, graph: &mut KnowledgeGraph, index: &ModuleIndex) {
        let classifier = self.config.layer_classifier();
        let mut components: BTreeMap<LayerKind, Vec<String>> = BTreeMap::new();
        for path in index.paths() {
            components
                .entry(classifier.classify(path))
                .or_default()
                .push(path.clone());
        }

        for kind in LayerKind::all() {
            let members = components.remove(&kind).unwrap_or_default();
            if members.is_empty() {
                continue;
            }
            graph.add_layer(Layer {
                name: kind.name().to_string(),
                purpose: kind.purpose().to_string(),
                components: members,
            });
        }
    }
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern '{pattern}'"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::parse_fallback;

    /// Regex-only parser so builder tests run without a grammar.
    struct FallbackPython;

    impl SourceParser for FallbackPython {
        fn language(&self) -> &'static str {
            "python"
        }
        fn file_extensions(&self) -> &[&str] {
            &["py", "pyw"]
        }
        fn parse(&self, path: &Path, content: &str) -> ParsedFile {
            parse_fallback(&path.to_string_lossy(), "python", content)
        }
    }

    fn assembler() -> GraphAssembler {
        GraphAssembler::new(vec![Box::new(FallbackPython)], Config::default())
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_build_small_project() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "app/services/user_service.py",
            "from app.models import user\n\nclass UserService:\n    def save(self):\n        pass\n",
        );
        write(tmp.path(), "app/models/user.py", "class User:\n    pass\n");

        let output = assembler().build(tmp.path()).unwrap();

        assert_eq!(output.stats.files_parsed, 2);
        assert_eq!(output.stats.classes_found, 2);
        assert_eq!(output.stats.languages.get("python"), Some(&2));

        let service = NodeId("app/services/user_service.py:UserService".to_string());
        let model = NodeId("app/models/user.py:User".to_string());
        assert!(output.graph.contains_node(&service));
        assert!(output.graph.contains_node(&model));

        let deps = output.graph.outgoing_edges(&service);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target, model);
        assert_eq!(deps[0].relation, Relation::DependsOn);
    }

    #[test]
    fn test_unresolved_imports_are_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "app/main.py",
            "import requests\n\nclass App:\n    pass\n",
        );

        let output = assembler().build(tmp.path()).unwrap();
        assert_eq!(output.graph.edge_count(), 0);
    }

    #[test]
    fn test_excluded_directories_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "app/main.py", "class App:\n    pass\n");
        write(
            tmp.path(),
            "venv/lib/junk.py",
            "class ShouldNotAppear:\n    pass\n",
        );
        write(
            tmp.path(),
            "node_modules/pkg/index.py",
            "class AlsoHidden:\n    pass\n",
        );

        let output = assembler().build(tmp.path()).unwrap();
        assert_eq!(output.stats.files_parsed, 1);
    }

    #[test]
    fn test_classless_module_gets_stem_node() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "app/util.py", "def helper():\n    pass\n");
        write(tmp.path(), "app/main.py", "import util\n");

        let output = assembler().build(tmp.path()).unwrap();

        let util = NodeId("app/util.py:util".to_string());
        let node = output.graph.node(&util).unwrap();
        assert_eq!(node.kind, NodeKind::Module);
        assert_eq!(output.graph.incoming_edges(&util).len(), 1);
    }

    #[test]
    fn test_layers_cover_all_modules() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "app/api/routes.py", "class Routes:\n    pass\n");
        write(
            tmp.path(),
            "app/order_service.py",
            "class OrderService:\n    pass\n",
        );

        let output = assembler().build(tmp.path()).unwrap();

        let total: usize = output.graph.layers.iter().map(|l| l.components.len()).sum();
        assert_eq!(total, 2);
        assert!(output.graph.layers.iter().any(|l| l.name == "presentation"));
        assert!(output.graph.layers.iter().any(|l| l.name == "business"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a/x.py", "from b import y\n\nclass X:\n    pass\n");
        write(tmp.path(), "b/y.py", "class Y:\n    pass\n");

        let first = assembler().build(tmp.path()).unwrap();
        let second = assembler().build(tmp.path()).unwrap();

        let ids_a: Vec<_> = first.graph.node_ids().collect();
        let ids_b: Vec<_> = second.graph.node_ids().collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(first.graph.edge_count(), second.graph.edge_count());
    }

    #[test]
    fn test_progress_callback_reaches_total() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.py", "class A:\n    pass\n");
        write(tmp.path(), "b.py", "class B:\n    pass\n");

        let seen = std::sync::Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let assembler = assembler().with_progress(Box::new(move |done, total| {
            assert!(done <= total);
            seen_cb.fetch_max(done, Ordering::Relaxed);
        }));

        assembler.build(tmp.path()).unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }
}
