use serde::{Deserialize, Serialize};

/// The four architectural layers every component is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Presentation,
    Business,
    Data,
    Infrastructure,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Presentation => "presentation",
            LayerKind::Business => "business",
            LayerKind::Data => "data",
            LayerKind::Infrastructure => "infrastructure",
        }
    }

    pub fn purpose(&self) -> &'static str {
        match self {
            LayerKind::Presentation => "User interface and API surface",
            LayerKind::Business => "Core business logic and domain rules",
            LayerKind::Data => "Data models and persistence",
            LayerKind::Infrastructure => "Cross-cutting utilities and integration",
        }
    }

    pub fn all() -> [LayerKind; 4] {
        [
            LayerKind::Presentation,
            LayerKind::Business,
            LayerKind::Data,
            LayerKind::Infrastructure,
        ]
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Assigns each module path to a layer by keyword matching.
///
/// Rules are an ordered table and the first matching keyword wins, so a path
/// like `api/user_service.py` lands in presentation, not business. Paths
/// nothing matches fall through to directory conventions, then to
/// infrastructure.
#[derive(Debug, Clone)]
pub struct LayerClassifier {
    rules: Vec<(LayerKind, Vec<String>)>,
}

impl Default for LayerClassifier {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            rules: vec![
                (
                    LayerKind::Presentation,
                    owned(&[
                        "controller", "view", "component", "page", "screen", "handler",
                        "route", "api", "endpoint", "ui", "frontend",
                    ]),
                ),
                (
                    LayerKind::Business,
                    owned(&[
                        "service", "usecase", "domain", "business", "core", "logic",
                        "manager", "processor", "engine", "workflow",
                    ]),
                ),
                (
                    LayerKind::Data,
                    owned(&[
                        "repository", "dao", "model", "entity", "schema", "database",
                        "db", "store", "persistence", "orm",
                    ]),
                ),
                (
                    LayerKind::Infrastructure,
                    owned(&[
                        "config", "util", "helper", "common", "shared", "middleware",
                        "adapter", "client", "provider",
                    ]),
                ),
            ],
        }
    }
}

impl LayerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the keyword table for one layer. Order of the layers in the
    /// table is fixed; only the keywords change.
    pub fn override_keywords(&mut self, layer: LayerKind, keywords: Vec<String>) {
        if let Some(entry) = self.rules.iter_mut().find(|(l, _)| *l == layer) {
            entry.1 = keywords;
        }
    }

    /// Classify a module path.
    pub fn classify(&self, path: &str) -> LayerKind {
        let lowered = path.to_lowercase();

        for (layer, keywords) in &self.rules {
            if keywords.iter().any(|kw| lowered.contains(kw.as_str())) {
                return *layer;
            }
        }

        // Directory conventions for paths with no keyword hit.
        if lowered.contains("/api/") || lowered.contains("/routes/") {
            LayerKind::Presentation
        } else if lowered.contains("/services/") || lowered.contains("/domain/") {
            LayerKind::Business
        } else if lowered.contains("/models/") || lowered.contains("/db/") {
            LayerKind::Data
        } else {
            LayerKind::Infrastructure
        }
    }
}
