use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parser::ParsedFile;

/// Aggregated metadata for one module (one source file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub path: String,
    pub language: String,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
}

/// Index of all parsed modules, keyed by repository-relative path.
///
/// Parsing runs in parallel; results are merged here by a single writer
/// afterwards, so the map itself never needs synchronization. BTreeMap keys
/// give resolver iteration a deterministic order.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<String, ModuleInfo>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one parsed file into the index.
    pub fn insert(&mut self, rel_path: &str, parsed: &ParsedFile) {
        let exports = parsed
            .symbols
            .iter()
            .filter(|s| {
                // Python convention: underscore prefix means private.
                parsed.language != "python" || !s.name.starts_with('_')
            })
            .map(|s| s.name.clone())
            .collect();

        let info = ModuleInfo {
            path: rel_path.to_string(),
            language: parsed.language.clone(),
            imports: parsed.imports.iter().map(|i| i.module.clone()).collect(),
            exports,
            classes: parsed.classes().map(|s| s.name.clone()).collect(),
            functions: parsed.functions().map(|s| s.name.clone()).collect(),
        };
        self.modules.insert(rel_path.to_string(), info);
    }

    pub fn get(&self, path: &str) -> Option<&ModuleInfo> {
        self.modules.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.modules.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModuleInfo)> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
