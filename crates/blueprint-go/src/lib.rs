use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use blueprint_core::fallback::parse_fallback;
use blueprint_core::parser::{
    ParsedCall, ParsedFile, ParsedImport, ParsedSymbol, SourceParser, SymbolKind,
};

const STRUCT_QUERY_SRC: &str = r#"
(type_spec
  name: (type_identifier) @name
  type: (struct_type))
"#;

const INTERFACE_QUERY_SRC: &str = r#"
(type_spec
  name: (type_identifier) @name
  type: (interface_type))
"#;

const FUNCTION_QUERY_SRC: &str = r#"
(function_declaration
  name: (identifier) @name)
"#;

const METHOD_QUERY_SRC: &str = r#"
(method_declaration
  receiver: (parameter_list
    (parameter_declaration
      type: [
        (pointer_type (type_identifier) @receiver)
        (type_identifier) @receiver
      ]))
  name: (field_identifier) @name)
"#;

const IMPORT_QUERY_SRC: &str = r#"
(import_spec
  path: (interpreted_string_literal) @path)
"#;

const CALL_QUERY_SRC: &str = r#"
(call_expression
  function: [
    (identifier) @name
    (selector_expression
      operand: (_) @object
      field: (field_identifier) @method)
  ])
"#;

/// Go source parser using tree-sitter. Structs map to classes, interfaces to
/// interfaces, methods carry their receiver type as parent.
pub struct GoParser {
    language: Language,
    struct_query: Query,
    interface_query: Query,
    function_query: Query,
    method_query: Query,
    import_query: Query,
    call_query: Query,
}

impl GoParser {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_go::LANGUAGE.into();
        Ok(Self {
            struct_query: Query::new(&language, STRUCT_QUERY_SRC)
                .context("failed to compile struct query")?,
            interface_query: Query::new(&language, INTERFACE_QUERY_SRC)
                .context("failed to compile interface query")?,
            function_query: Query::new(&language, FUNCTION_QUERY_SRC)
                .context("failed to compile function query")?,
            method_query: Query::new(&language, METHOD_QUERY_SRC)
                .context("failed to compile method query")?,
            import_query: Query::new(&language, IMPORT_QUERY_SRC)
                .context("failed to compile import query")?,
            call_query: Query::new(&language, CALL_QUERY_SRC)
                .context("failed to compile call query")?,
            language,
        })
    }

    fn extract_types(
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
                let spec = name_node.parent().unwrap_or(name_node);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind,
                    line_start: spec.start_position().row + 1,
                    line_end: spec.end_position().row + 1,
                    signature: first_line(spec, content),
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
                let decl = name_node.parent().unwrap_or(name_node);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind: SymbolKind::Function,
                    line_start: decl.start_position().row + 1,
                    line_end: decl.end_position().row + 1,
                    signature: first_line(decl, content),
                    parent: None,
                });
            }
        }
    }

    fn extract_methods(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let name_idx = capture_index(&self.method_query, "name");
        let receiver_idx = capture_index(&self.method_query, "receiver");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.method_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            let mut name_node = None;
            let mut receiver = None;

            for capture in m.captures {
                let idx = Some(capture.index as usize);
                if idx == name_idx {
                    name_node = Some(capture.node);
                } else if idx == receiver_idx {
                    receiver = Some(node_text(capture.node, content));
                }
            }

            if let Some(name_node) = name_node {
                let decl = name_node.parent().unwrap_or(name_node);
                result.symbols.push(ParsedSymbol {
                    name: node_text(name_node, content),
                    kind: SymbolKind::Method,
                    line_start: decl.start_position().row + 1,
                    line_end: decl.end_position().row + 1,
                    signature: first_line(decl, content),
                    parent: receiver,
                });
            }
        }
    }

    fn extract_imports(&self, root: Node, content: &str, result: &mut ParsedFile) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.import_query, root, content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let raw = node_text(capture.node, content);
                result.imports.push(ParsedImport {
                    module: raw.trim_matches('"').to_string(),
                    names: Vec::new(),
                    alias: None,
                    line: capture.node.start_position().row + 1,
                    is_relative: false,
                });
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

impl SourceParser for GoParser {
    fn language(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &[&str] {
        &["go"]
    }

    fn parse(&self, path: &Path, content: &str) -> ParsedFile {
        let rel = path.to_string_lossy().replace('\\', "/");

        let mut parser = Parser::new();
        if parser.set_language(&self.language).is_err() {
            return parse_fallback(&rel, "go", content);
        }
        let Some(tree) = parser.parse(content, None) else {
            tracing::debug!("tree-sitter failed on {rel}, using fallback");
            return parse_fallback(&rel, "go", content);
        };

        let mut result = ParsedFile::new(rel, "go");
        let root = tree.root_node();
        self.extract_types(&self.struct_query, SymbolKind::Class, root, content, &mut result);
        self.extract_types(
            &self.interface_query,
            SymbolKind::Interface,
            root,
            content,
            &mut result,
        );
        self.extract_functions(root, content, &mut result);
        self.extract_methods(root, content, &mut result);
        self.extract_imports(root, content, &mut result);
        self.extract_calls(root, content, &mut result);
        result
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str) -> ParsedFile {
        let parser = GoParser::new().unwrap();
        parser.parse(&PathBuf::from("internal/server/server.go"), content)
    }

    #[test]
    fn test_extract_structs_and_interfaces() {
        let parsed = parse(
            r#"
package server

type Server struct {
    addr string
}

type Store interface {
    Get(key string) (string, error)
}
"#,
        );

        let server = parsed.symbols.iter().find(|s| s.name == "Server").unwrap();
        assert_eq!(server.kind, SymbolKind::Class);

        let store = parsed.symbols.iter().find(|s| s.name == "Store").unwrap();
        assert_eq!(store.kind, SymbolKind::Interface);
    }

    #[test]
    fn test_extract_functions_and_methods() {
        let parsed = parse(
            r#"
package server

func New(addr string) *Server {
    return &Server{addr: addr}
}

func (s *Server) Run() error {
    return nil
}
"#,
        );

        let new = parsed.symbols.iter().find(|s| s.name == "New").unwrap();
        assert_eq!(new.kind, SymbolKind::Function);
        assert!(new.parent.is_none());

        let run = parsed.symbols.iter().find(|s| s.name == "Run").unwrap();
        assert_eq!(run.kind, SymbolKind::Method);
        assert_eq!(run.parent.as_deref(), Some("Server"));
    }

    #[test]
    fn test_extract_imports() {
        let parsed = parse(
            r#"
package server

import (
    "fmt"
    "net/http"
)

import "os"
"#,
        );

        let modules: Vec<&str> = parsed.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["fmt", "net/http", "os"]);
    }

    #[test]
    fn test_extract_calls() {
        let parsed = parse(
            r#"
package server

func run() {
    setup()
    log.Println("started")
}
"#,
        );

        assert!(parsed
            .calls
            .iter()
            .any(|c| c.name == "setup" && !c.is_method));
        assert!(parsed
            .calls
            .iter()
            .any(|c| c.name == "Println" && c.object.as_deref() == Some("log")));
    }
}
