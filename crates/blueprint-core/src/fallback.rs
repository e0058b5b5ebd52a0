//! Deterministic line-oriented extraction used when tree-sitter parsing
//! fails. Coarser than the AST path (single-line ranges, no call sites) but
//! always produces a well-formed result.

use std::sync::LazyLock;

use regex::Regex;

use crate::parser::{ParsedFile, ParsedImport, ParsedSymbol, SymbolKind};

static PY_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:from\s+([\w.]+)\s+)?import\s+(.+)$").unwrap());
static PY_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+(\w+)\s*\(").unwrap());
static PY_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^class\s+(\w+)").unwrap());

static TS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^import\s+.*?from\s+['"]([^'"]+)['"]"#).unwrap());
static TS_FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:export\s+)?(?:async\s+)?function\s+(\w+)|(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\(").unwrap()
});
static TS_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+)?class\s+(\w+)").unwrap());
static TS_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:export\s+)?interface\s+(\w+)").unwrap());

static GO_QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static GO_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^func\s+(?:\([^)]+\)\s*)?(\w+)\s*\(").unwrap());
static GO_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^type\s+(\w+)\s+(struct|interface)").unwrap());

/// Parse `content` with per-language regexes. Pure function of its inputs.
pub fn parse_fallback(path: &str, language: &str, content: &str) -> ParsedFile {
    let mut result = ParsedFile::new(path, language);

    match language {
        "python" => parse_python(content, &mut result),
        "typescript" | "tsx" | "javascript" => parse_typescript(content, &mut result),
        "go" => parse_go(content, &mut result),
        other => result
            .errors
            .push(format!("no fallback extractor for language '{other}'")),
    }

    result
}

fn parse_python(content: &str, result: &mut ParsedFile) {
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(caps) = PY_IMPORT.captures(trimmed) {
            if let Some(module) = caps.get(1) {
                let names: Vec<String> = caps[2]
                    .split(',')
                    .map(|n| n.trim().split(" as ").next().unwrap_or("").to_string())
                    .filter(|n| !n.is_empty() && n != "*")
                    .collect();
                result.imports.push(ParsedImport {
                    module: module.as_str().to_string(),
                    names,
                    alias: None,
                    line: i + 1,
                    is_relative: module.as_str().starts_with('.'),
                });
            } else {
                for part in caps[2].split(',') {
                    let module = part.trim().split(" as ").next().unwrap_or("").to_string();
                    if !module.is_empty() {
                        result.imports.push(ParsedImport {
                            module,
                            names: Vec::new(),
                            alias: None,
                            line: i + 1,
                            is_relative: false,
                        });
                    }
                }
            }
            continue;
        }

        if let Some(caps) = PY_FUNC.captures(line) {
            let indented = !caps[1].is_empty();
            result.symbols.push(ParsedSymbol {
                name: caps[2].to_string(),
                kind: if indented {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                },
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        } else if let Some(caps) = PY_CLASS.captures(trimmed) {
            result.symbols.push(ParsedSymbol {
                name: caps[1].to_string(),
                kind: SymbolKind::Class,
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        }
    }
}

fn parse_typescript(content: &str, result: &mut ParsedFile) {
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if let Some(caps) = TS_IMPORT.captures(trimmed) {
            let module = caps[1].to_string();
            let is_relative = module.starts_with('.');
            result.imports.push(ParsedImport {
                module,
                names: Vec::new(),
                alias: None,
                line: i + 1,
                is_relative,
            });
            continue;
        }

        if let Some(caps) = TS_CLASS.captures(trimmed) {
            result.symbols.push(ParsedSymbol {
                name: caps[1].to_string(),
                kind: SymbolKind::Class,
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        } else if let Some(caps) = TS_INTERFACE.captures(trimmed) {
            result.symbols.push(ParsedSymbol {
                name: caps[1].to_string(),
                kind: SymbolKind::Interface,
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        } else if let Some(caps) = TS_FUNC.captures(trimmed) {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string());
            if let Some(name) = name {
                result.symbols.push(ParsedSymbol {
                    name,
                    kind: SymbolKind::Function,
                    line_start: i + 1,
                    line_end: i + 1,
                    signature: Some(trimmed.to_string()),
                    parent: None,
                });
            }
        }
    }
}

fn parse_go(content: &str, result: &mut ParsedFile) {
    let mut in_import_block = false;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.starts_with("import (") {
            in_import_block = true;
            continue;
        }
        if in_import_block && trimmed.starts_with(')') {
            in_import_block = false;
            continue;
        }
        if in_import_block || trimmed.starts_with("import ") {
            if let Some(caps) = GO_QUOTED.captures(trimmed) {
                result.imports.push(ParsedImport {
                    module: caps[1].to_string(),
                    names: Vec::new(),
                    alias: None,
                    line: i + 1,
                    is_relative: false,
                });
            }
            continue;
        }

        if let Some(caps) = GO_FUNC.captures(line) {
            result.symbols.push(ParsedSymbol {
                name: caps[1].to_string(),
                kind: SymbolKind::Function,
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        } else if let Some(caps) = GO_TYPE.captures(line) {
            let kind = if &caps[2] == "struct" {
                SymbolKind::Class
            } else {
                SymbolKind::Interface
            };
            result.symbols.push(ParsedSymbol {
                name: caps[1].to_string(),
                kind,
                line_start: i + 1,
                line_end: i + 1,
                signature: Some(trimmed.to_string()),
                parent: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_fallback() {
        let content = "\
from app.services import user_service
import os, sys

class UserService:
    def save(self):
        pass

def main():
    pass
";
        let parsed = parse_fallback("app/main.py", "python", content);

        let modules: Vec<&str> = parsed.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["app.services", "os", "sys"]);

        let classes: Vec<&str> = parsed.classes().map(|s| s.name.as_str()).collect();
        assert_eq!(classes, vec!["UserService"]);

        let save = parsed.symbols.iter().find(|s| s.name == "save").unwrap();
        assert_eq!(save.kind, SymbolKind::Method);
        let main = parsed.symbols.iter().find(|s| s.name == "main").unwrap();
        assert_eq!(main.kind, SymbolKind::Function);
    }

    #[test]
    fn test_typescript_fallback() {
        let content = "\
import { User } from '../domain/user';

export interface UserRepo {
}

export class UserService {
}

export const handler = async (req) => req;
export function main() {}
";
        let parsed = parse_fallback("src/app.ts", "typescript", content);

        assert_eq!(parsed.imports.len(), 1);
        assert!(parsed.imports[0].is_relative);
        assert!(parsed.classes().any(|s| s.name == "UserService"));
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "UserRepo" && s.kind == SymbolKind::Interface));
        assert!(parsed.symbols.iter().any(|s| s.name == "main"));
    }

    #[test]
    fn test_go_fallback() {
        let content = "\
package main

import (
    \"fmt\"
    \"net/http\"
)

type Server struct {}

type Handler interface {}

func (s *Server) Run() {}

func main() {}
";
        let parsed = parse_fallback("cmd/main.go", "go", content);

        let modules: Vec<&str> = parsed.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["fmt", "net/http"]);
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "Server" && s.kind == SymbolKind::Class));
        assert!(parsed
            .symbols
            .iter()
            .any(|s| s.name == "Handler" && s.kind == SymbolKind::Interface));
        assert!(parsed.symbols.iter().any(|s| s.name == "Run"));
    }

    #[test]
    fn test_unknown_language_records_error() {
        let parsed = parse_fallback("x.zig", "zig", "const x = 1;");
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let content = "class A:\n    pass\n";
        let a = parse_fallback("a.py", "python", content);
        let b = parse_fallback("a.py", "python", content);
        assert_eq!(a.symbols.len(), b.symbols.len());
        assert_eq!(a.symbols[0].name, b.symbols[0].name);
    }
}
