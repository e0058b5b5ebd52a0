use std::path::Path;

use crate::index::ModuleIndex;

/// Heuristic import-to-module resolver.
///
/// Resolution is best-effort and explicitly approximate: rules run in a fixed
/// priority order and the first hit wins (not the best match). Imports no
/// rule can place are dropped by the caller without an error.
pub struct ImportResolver<'a> {
    index: &'a ModuleIndex,
}

impl<'a> ImportResolver<'a> {
    pub fn new(index: &'a ModuleIndex) -> Self {
        Self { index }
    }

    /// Resolve `import_name` as seen from the module at `from_path`.
    pub fn resolve(&self, from_path: &str, import_name: &str) -> Option<String> {
        if let Some(path) = self.match_stem(import_name) {
            return Some(path);
        }
        if let Some(path) = self.match_path(import_name) {
            return Some(path);
        }
        self.match_relative(from_path, import_name)
    }

    /// Rule 1: exact file-stem match against known modules, or a dotted
    /// import ending in the stem.
    fn match_stem(&self, import_name: &str) -> Option<String> {
        for path in self.index.paths() {
            let stem = Path::new(path).file_stem()?.to_string_lossy();
            if stem == import_name || import_name.ends_with(stem.as_ref()) {
                return Some(path.clone());
            }
        }
        None
    }

    /// Rule 2: the dotted import converted to a path appears as a substring
    /// of a module path.
    fn match_path(&self, import_name: &str) -> Option<String> {
        let import_path = import_name.replace('.', "/");
        self.index
            .paths()
            .find(|path| path.contains(&import_path))
            .cloned()
    }

    /// Rule 3: relative imports resolved against the importer's directory.
    fn match_relative(&self, from_path: &str, import_name: &str) -> Option<String> {
        if !import_name.starts_with('.') {
            return None;
        }
        let from_dir = Path::new(from_path)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let rel = import_name.trim_start_matches('.').replace('.', "/");
        let candidate = if from_dir.is_empty() {
            rel
        } else {
            format!("{from_dir}/{rel}")
        };
        self.index
            .paths()
            .find(|path| path.contains(&candidate))
            .cloned()
    }
}
