use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::layer::{LayerClassifier, LayerKind};

/// Top-level configuration from `.blueprint.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub layers: LayersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name for the analyzed system. Defaults to the repository
    /// directory name when empty.
    #[serde(default)]
    pub name: Option<String>,
    /// Languages to analyze; empty means all supported languages.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/__pycache__/**",
        "**/.git/**",
        "**/venv/**",
        "**/dist/**",
        "**/build/**",
        "**/.next/**",
        "**/coverage/**",
        "**/target/**",
        "**/vendor/**",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            languages: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Keyword overrides for layer classification. Empty lists keep the
/// built-in keyword table for that layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayersConfig {
    #[serde(default)]
    pub presentation: Vec<String>,
    #[serde(default)]
    pub business: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub infrastructure: Vec<String>,
}

impl Config {
    /// Load configuration from a `.blueprint.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `blueprint init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.blueprint.toml` in the given directory or any ancestor,
    /// or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(".blueprint.toml");
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(
                            "failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Build the layer classifier with any configured keyword overrides
    /// applied.
    pub fn layer_classifier(&self) -> LayerClassifier {
        let mut classifier = LayerClassifier::new();
        let overrides = [
            (LayerKind::Presentation, &self.layers.presentation),
            (LayerKind::Business, &self.layers.business),
            (LayerKind::Data, &self.layers.data),
            (LayerKind::Infrastructure, &self.layers.infrastructure),
        ];
        for (layer, keywords) in overrides {
            if !keywords.is_empty() {
                classifier.override_keywords(layer, keywords.clone());
            }
        }
        classifier
    }

    /// Generate default TOML content for `blueprint init`.
    pub fn default_toml() -> String {
        r#"# Blueprint - Architectural Knowledge Graph Configuration

[project]
# name = "my-system"
# Languages to analyze; omit for auto-detection.
# languages = ["python", "typescript", "go"]
exclude_patterns = [
    "**/node_modules/**",
    "**/__pycache__/**",
    "**/.git/**",
    "**/venv/**",
    "**/dist/**",
    "**/build/**",
    "**/.next/**",
    "**/coverage/**",
    "**/target/**",
    "**/vendor/**",
]

[layers]
# Keyword overrides for layer classification. Keywords match anywhere in
# the file path; first layer with a hit wins. Empty lists keep defaults.
# presentation = ["controller", "view", "handler", "route", "api"]
# business = ["service", "usecase", "domain", "manager"]
# data = ["repository", "model", "entity", "schema", "db"]
# infrastructure = ["config", "util", "middleware", "adapter"]
"#
        .to_string()
    }
}
