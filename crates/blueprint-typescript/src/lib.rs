use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use blueprint_core::fallback::parse_fallback;
use blueprint_core::parser::{
    ParsedCall, ParsedFile, ParsedImport, ParsedSymbol, SourceParser, SymbolKind,
};

const CLASS_QUERY_SRC: &str = r#"
(class_declaration
  name: (type_identifier) @name)
"#;

const INTERFACE_QUERY_SRC: &str = r#"
(interface_declaration
  name: (type_identifier) @name)
"#;

const TYPE_ALIAS_QUERY_SRC: &str = r#"
(type_alias_declaration
  name: (type_identifier) @name)
"#;

const FUNCTION_QUERY_SRC: &str = r#"
[
  (function_declaration
    name: (identifier) @name)
  (lexical_declaration
    (variable_declarator
      name: (identifier) @arrow_name
      value: (arrow_function)))
  (method_definition
    name: (property_identifier) @method_name)
]
"#;

const IMPORT_QUERY_SRC: &str = r#"
(import_statement
  source: (string) @path)
"#;

const CALL_QUERY_SRC: &str = r#"
(call_expression
  function: [
    (identifier) @name
    (member_expression
      object: (_) @object
      property: (property_identifier) @method)
  ])
"#;

/// Holds queries compiled for one TypeScript dialect.
struct QuerySet {
    class_query: Query,
    interface_query: Query,
    type_alias_query: Query,
    function_query: Query,
    import_query: Query,
    call_query: Query,
}

fn compile_queries(language: &Language) -> Result<QuerySet> {
    Ok(QuerySet {
        class_query: Query::new(language, CLASS_QUERY_SRC)
            .context("failed to compile class query")?,
        interface_query: Query::new(language, INTERFACE_QUERY_SRC)
            .context("failed to compile interface query")?,
        type_alias_query: Query::new(language, TYPE_ALIAS_QUERY_SRC)
            .context("failed to compile type alias query")?,
        function_query: Query::new(language, FUNCTION_QUERY_SRC)
            .context("failed to compile function query")?,
        import_query: Query::new(language, IMPORT_QUERY_SRC)
            .context("failed to compile import query")?,
        call_query: Query::new(language, CALL_QUERY_SRC)
            .context("failed to compile call query")?,
    })
}

/// TypeScript, TSX, and JavaScript parser using tree-sitter.
///
/// Plain JavaScript parses with the TypeScript grammar; JSX files use the TSX
/// grammar. Files the grammar rejects fall back to line-oriented extraction.
pub struct TypeScriptParser {
    ts_language: Language,
    tsx_language: Language,
    ts_queries: QuerySet,
    tsx_queries: QuerySet,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self> {
        let ts_language: Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        let tsx_language: Language = tree_sitter_typescript::LANGUAGE_TSX.into();
        let ts_queries = compile_queries(&ts_language)?;
        let tsx_queries = compile_queries(&tsx_language)?;
        Ok(Self {
            ts_language,
            tsx_language,
            ts_queries,
            tsx_queries,
        })
    }

    fn dialect(&self, path: &Path) -> (&Language, &QuerySet, &'static str) {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") => (&self.tsx_language, &self.tsx_queries, "tsx"),
            Some("jsx") => (&self.tsx_language, &self.tsx_queries, "javascript"),
            Some("js" | "mjs" | "cjs") => (&self.ts_language, &self.ts_queries, "javascript"),
            _ => (&self.ts_language, &self.ts_queries, "typescript"),
        }
    }

    fn extract_type(
        &self,
        query: &Query,
        kind: SymbolKind,
        root: Node,
        content: &str,
        result: &mut ParsedFile,
    ) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let name_node = capture.node;
                let decl = name_node.parent().unwrap_or(name_node);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind,
                    line_start: decl.start_position().row + 1,
                    line_end: decl.end_position().row + 1,
                    signature: first_line(decl, content),
                    parent: None,
                });
            }
        }
    }

    fn extract_functions(&self, queries: &QuerySet, root: Node, content: &str, result: &mut ParsedFile) {
        let name_idx = capture_index(&queries.function_query, "name");
        let arrow_idx = capture_index(&queries.function_query, "arrow_name");
        let method_idx = capture_index(&queries.function_query, "method_name");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&queries.function_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let idx = Some(capture.index as usize);
                let name_node = capture.node;
                let is_method = idx == method_idx;
                if idx != name_idx && idx != arrow_idx && !is_method {
                    continue;
                }

                // Arrow functions hang off the declarator, others off the
                // declaration itself.
                let decl = enclosing_declaration(name_node);
                let parent = if is_method {
                    enclosing_class(name_node, content)
                } else {
                    None
                };
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind: if is_method {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    },
                    line_start: decl.start_position().row + 1,
                    line_end: decl.end_position().row + 1,
                    signature: first_line(decl, content),
                    parent,
                });
            }
        }
    }

    fn extract_imports(&self, queries: &QuerySet, root: Node, content: &str, result: &mut ParsedFile) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&queries.import_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let raw = node_text(capture.node, content);
                let module = raw.trim_matches(['"', '\'']).to_string();
                result.imports.push(ParsedImport {
                    is_relative: module.starts_with('.'),
                    module,
                    names: Vec::new(),
                    alias: None,
                    line: capture.node.start_position().row + 1,
                });
            }
        }
    }

    fn extract_calls(&self, queries: &QuerySet, root: Node, content: &str, result: &mut ParsedFile) {
        let name_idx = capture_index(&queries.call_query, "name");
        let object_idx = capture_index(&queries.call_query, "object");
        let method_idx = capture_index(&queries.call_query, "method");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&queries.call_query, root, content.as_bytes());
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

impl SourceParser for TypeScriptParser {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&str] {
        &["ts", "mts", "cts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn parse(&self, path: &Path, content: &str) -> ParsedFile {
        let rel = path.to_string_lossy().replace('\\', "/");
        let (language, queries, dialect) = self.dialect(path);

        let mut parser = Parser::new();
        if parser.set_language(language).is_err() {
            return parse_fallback(&rel, dialect, content);
        }
        let Some(tree) = parser.parse(content, None) else {
            tracing::debug!("tree-sitter failed on {rel}, using fallback");
            return parse_fallback(&rel, dialect, content);
        };

        let mut result = ParsedFile::new(rel, dialect);
        let root = tree.root_node();
        self.extract_type(&queries.class_query, SymbolKind::Class, root, content, &mut result);
        self.extract_type(
            &queries.interface_query,
            SymbolKind::Interface,
            root,
            content,
            &mut result,
        );
        self.extract_type(
            &queries.type_alias_query,
            SymbolKind::TypeAlias,
            root,
            content,
            &mut result,
        );
        self.extract_functions(queries, root, content, &mut result);
        self.extract_imports(queries, root, content, &mut result);
        self.extract_calls(queries, root, content, &mut result);
        result
    }
}

/// Nearest ancestor that is a full declaration, for line ranges.
fn enclosing_declaration(node: Node) -> Node {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "function_declaration"
            | "method_definition"
            | "variable_declarator"
            | "lexical_declaration" => current = parent,
            _ => break,
        }
    }
    current
}

fn enclosing_class(node: Node, content: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "class_declaration" {
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
