use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of a parsed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    TypeAlias,
}

/// A symbol extracted from one source file. Line ranges are 1-indexed and
/// inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default)]
    pub signature: Option<String>,
    /// Enclosing class for methods.
    #[serde(default)]
    pub parent: Option<String>,
}

/// An import statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedImport {
    pub module: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub alias: Option<String>,
    pub line: usize,
    #[serde(default)]
    pub is_relative: bool,
}

/// A function or method call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCall {
    pub name: String,
    #[serde(default)]
    pub object: Option<String>,
    pub line: usize,
    #[serde(default)]
    pub is_method: bool,
}

/// Everything extracted from one source file.
///
/// Parsing never fails hard: unreadable or unparsable input yields a
/// well-formed `ParsedFile` whose `errors` records what went wrong, so the
/// pipeline can continue with the rest of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    pub path: String,
    pub language: String,
    #[serde(default)]
    pub symbols: Vec<ParsedSymbol>,
    #[serde(default)]
    pub imports: Vec<ParsedImport>,
    #[serde(default)]
    pub calls: Vec<ParsedCall>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ParsedFile {
    pub fn new(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            symbols: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_error(
        path: impl Into<String>,
        language: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut parsed = Self::new(path, language);
        parsed.errors.push(error.into());
        parsed
    }

    pub fn functions(&self) -> impl Iterator<Item = &ParsedSymbol> {
        self.symbols
            .iter()
            .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ParsedSymbol> {
        self.symbols
            .iter()
            .filter(|s| matches!(s.kind, SymbolKind::Class | SymbolKind::Interface))
    }
}

/// Trait implemented by each language parser.
///
/// `parse` must be a pure function of (path, content): identical input yields
/// identical output, which the diff engine relies on for idempotent rebuilds.
pub trait SourceParser: Send + Sync {
    /// Language name (e.g., "python", "go").
    fn language(&self) -> &'static str;

    /// File extensions handled by this parser (without the leading dot).
    fn file_extensions(&self) -> &[&str];

    /// Extract symbols, imports, and calls. Never fails; syntax-tree failure
    /// falls back to line-oriented extraction.
    fn parse(&self, path: &Path, content: &str) -> ParsedFile;
}
