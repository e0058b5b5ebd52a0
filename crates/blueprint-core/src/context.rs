use std::collections::BTreeMap;

use crate::index::ModuleIndex;
use crate::types::BoundedContext;

const WRAPPER_DIRS: &[&str] = &["src", "lib", "pkg", "app", "internal"];

/// Groups modules into bounded contexts by top-level directory.
///
/// The grouping key is the first path segment that is not a generic wrapper
/// directory (`src`, `lib`, ...). Top-level files with no meaningful segment
/// are skipped rather than lumped into a catch-all context.
#[derive(Debug, Default)]
pub struct ContextDetector;

impl ContextDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, index: &ModuleIndex) -> Vec<BoundedContext> {
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();

        for path in index.paths() {
            if let Some(name) = context_segment(path) {
                groups.entry(name).or_default().push(path.as_str());
            }
        }

        groups
            .into_iter()
            .map(|(name, files)| {
                let mut key_entities = Vec::new();
                for file in &files {
                    if let Some(info) = index.get(file) {
                        for class in &info.classes {
                            if !key_entities.contains(class) {
                                key_entities.push(class.clone());
                            }
                        }
                    }
                }
                BoundedContext {
                    purpose: format!("Handles {} functionality", name.to_lowercase()),
                    name,
                    primary_files: files.iter().map(|f| f.to_string()).collect(),
                    key_entities,
                    dependencies: Vec::new(),
                }
            })
            .collect()
    }
}

/// First non-wrapper path segment, titlecased, or None for bare files.
fn context_segment(path: &str) -> Option<String> {
    let mut segments = path.split('/').peekable();
    let mut candidate = None;

    while let Some(segment) = segments.next() {
        // The last segment is the file itself, not a directory.
        if segments.peek().is_none() {
            break;
        }
        if WRAPPER_DIRS.contains(&segment) {
            continue;
        }
        candidate = Some(segment);
        break;
    }

    candidate.map(titlecase)
}

fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParsedFile, ParsedSymbol, SymbolKind};

    fn file_with_class(path: &str, class: &str) -> ParsedFile {
        let mut parsed = ParsedFile::new(path, "python");
        parsed.symbols.push(ParsedSymbol {
            name: class.to_string(),
            kind: SymbolKind::Class,
            line_start: 1,
            line_end: 1,
            signature: None,
            parent: None,
        });
        parsed
    }

    #[test]
    fn test_groups_by_top_level_directory() {
        let mut index = ModuleIndex::new();
        index.insert("orders/api.py", &file_with_class("orders/api.py", "OrderApi"));
        index.insert(
            "orders/service.py",
            &file_with_class("orders/service.py", "OrderService"),
        );
        index.insert("users/api.py", &file_with_class("users/api.py", "UserApi"));

        let detector = ContextDetector::new();
        let contexts = detector.detect(&index);

        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].name, "Orders");
        assert_eq!(contexts[0].primary_files.len(), 2);
        assert_eq!(contexts[0].key_entities, vec!["OrderApi", "OrderService"]);
        assert_eq!(contexts[1].name, "Users");
    }

    #[test]
    fn test_skips_wrapper_directories() {
        let mut index = ModuleIndex::new();
        index.insert(
            "src/billing/invoice.ts",
            &file_with_class("src/billing/invoice.ts", "Invoice"),
        );

        let contexts = ContextDetector::new().detect(&index);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].name, "Billing");
        assert_eq!(contexts[0].purpose, "Handles billing functionality");
    }

    #[test]
    fn test_top_level_files_are_skipped() {
        let mut index = ModuleIndex::new();
        index.insert("main.py", &ParsedFile::new("main.py", "python"));
        index.insert("src/setup.py", &ParsedFile::new("src/setup.py", "python"));

        let contexts = ContextDetector::new().detect(&index);
        assert!(contexts.is_empty());
    }

    #[test]
    fn test_key_entities_are_unique_and_ordered() {
        let mut index = ModuleIndex::new();
        index.insert("pay/a.py", &file_with_class("pay/a.py", "Gateway"));
        index.insert("pay/b.py", &file_with_class("pay/b.py", "Gateway"));

        let contexts = ContextDetector::new().detect(&index);
        assert_eq!(contexts[0].key_entities, vec!["Gateway"]);
    }
}
