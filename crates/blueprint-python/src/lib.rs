use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use blueprint_core::fallback::parse_fallback;
use blueprint_core::parser::{
    ParsedCall, ParsedFile, ParsedImport, ParsedSymbol, SourceParser, SymbolKind,
};

const CLASS_QUERY_SRC: &str = r#"
(class_definition
  name: (identifier) @name)
"#;

const FUNCTION_QUERY_SRC: &str = r#"
(function_definition
  name: (identifier) @name)
"#;

const IMPORT_QUERY_SRC: &str = r#"
[
  (import_statement) @import
  (import_from_statement) @import
]
"#;

const CALL_QUERY_SRC: &str = r#"
(call
  function: [
    (identifier) @name
    (attribute
      object: (_) @object
      attribute: (identifier) @method)
  ])
"#;

/// Python source parser using tree-sitter.
///
/// Falls back to line-oriented extraction when the grammar cannot produce a
/// tree, so `parse` always returns a well-formed result.
pub struct PythonParser {
    language: Language,
    class_query: Query,
    function_query: Query,
    import_query: Query,
    call_query: Query,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        Ok(Self {
            class_query: Query::new(&language, CLASS_QUERY_SRC)
                .context("failed to compile class query")?,
            function_query: Query::new(&language, FUNCTION_QUERY_SRC)
                .context("failed to compile function query")?,
            import_query: Query::new(&language, IMPORT_QUERY_SRC)
                .context("failed to compile import query")?,
            call_query: Query::new(&language, CALL_QUERY_SRC)
                .context("failed to compile call query")?,
            language,
        })
    }

    fn extract_classes(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.class_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let name_node = capture.node;
                // The enclosing class_definition carries the full range.
                let class_node = name_node.parent().unwrap_or(name_node);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind: SymbolKind::Class,
                    line_start: class_node.start_position().row + 1,
                    line_end: class_node.end_position().row + 1,
                    signature: first_line(class_node, content),
                    parent: None,
                });
            }
        }
    }

    fn extract_functions(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.function_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let name_node = capture.node;
                let func_node = name_node.parent().unwrap_or(name_node);
                let parent = enclosing_class(func_node, content);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind: if parent.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    },
                    line_start: func_node.start_position().row + 1,
                    line_end: func_node.end_position().row + 1,
                    signature: first_line(func_node, content),
                    parent,
                });
            }
        }
    }

    fn extract_imports(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.import_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let line = node.start_position().row + 1;
                match node.kind() {
                    "import_from_statement" => {
                        let Some(module_node) = node.child_by_field_name("module_name") else {
                            continue;
                        };
                        let module = node_text(module_node, content);
                        let names = node
                            .children_by_field_name("name", &mut node.walk())
                            .map(|n| {
                                // `x as y` imports carry the original name.
                                n.child_by_field_name("name")
                                    .map(|inner| node_text(inner, content))
                                    .unwrap_or_else(|| node_text(n, content))
                            })
                            .collect();
                        result.imports.push(ParsedImport {
                            is_relative: module.starts_with('.'),
                            module,
                            names,
                            alias: None,
                            line,
                        });
                    }
                    "import_statement" => {
                        for child in node.children_by_field_name("name", &mut node.walk()) {
                            let (module, alias) = match child.kind() {
                                "aliased_import" => {
                                    let module = child
                                        .child_by_field_name("name")
                                        .map(|n| node_text(n, content))
                                        .unwrap_or_default();
                                    let alias = child
                                        .child_by_field_name("alias")
                                        .map(|n| node_text(n, content));
                                    (module, alias)
                                }
                                _ => (node_text(child, content), None),
                            };
                            if module.is_empty() {
                                continue;
                            }
                            result.imports.push(ParsedImport {
                                module,
                                names: Vec::new(),
                                alias,
                                line,
                                is_relative: false,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn extract_calls(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let name_idx = capture_index(&self.call_query, "name");
        let object_idx = capture_index(&self.call_query, "object");
        let method_idx = capture_index(&self.call_query, "method");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.call_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            let mut name = None;
            let mut object = None;
            let mut line = 0;
            let mut is_method = false;

            for capture in m.captures {
                let idx = Some(capture.index as usize);
                if idx == name_idx {
                    name = Some(node_text(capture.node, content));
                    line = capture.node.start_position().row + 1;
                } else if idx == method_idx {
                    name = Some(node_text(capture.node, content));
                    line = capture.node.start_position().row + 1;
                    is_method = true;
                } else if idx == object_idx {
                    object = Some(node_text(capture.node, content));
                }
            }

            if let Some(name) = name {
                result.calls.push(ParsedCall {
                    name,
                    object,
                    line,
                    is_method,
                });
            }
        }
    }
}

impl SourceParser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyw"]
    }

    fn parse(&self, path: &Path, content: &str) -> ParsedFile {
        let rel = path.to_string_lossy().replace('\\', "/");

        let mut parser = Parser::new();
        if parser.set_language(&self.language).is_err() {
            return parse_fallback(&rel, "python", content);
        }
        let Some(tree) = parser.parse(content, None) else {
            tracing::debug!("tree-sitter failed on {rel}, using fallback");
            return parse_fallback(&rel, "python", content);
        };

        let mut result = ParsedFile::new(rel, "python");
        let root = tree.root_node();
        self.extract_classes(root, content, &mut result);
        self.extract_functions(root, content, &mut result);
        self.extract_imports(root, content, &mut result);
        self.extract_calls(root, content, &mut result);
        result
    }
}

/// Name of the nearest enclosing class definition, if any.
fn enclosing_class(node: Node, content: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "class_definition" {
            return n
                .child_by_field_name("name")
                .map(|name| node_text(name, content));
        }
        current = n.parent();
    }
    None
}

fn capture_index(query: &Query, name: &str) -> Option<usize> {
    query.capture_names().iter().position(|n| *n == name)
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

fn first_line(node: Node, source: &str) -> Option<String> {
    source[node.byte_range()]
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}
