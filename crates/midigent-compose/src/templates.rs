//! Summary template loading.
//!
//! `data/summary.yaml` holds named handlebars templates, each with an
//! optional example payload used to check the template renders.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::renderer::RenderError;

pub(crate) const SUMMARY_YAML: &str = include_str!("../data/summary.yaml");

/// Top-level templates file structure
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesFile {
    pub version: String,
    pub templates: HashMap<String, Template>,
}

/// A single template definition
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub description: String,
    pub template: String,
    #[serde(default)]
    pub example: Option<serde_json::Value>,
}

impl TemplatesFile {
    /// Templates shipped with the crate
    pub fn builtin() -> Result<Self, RenderError> {
        Self::from_yaml(SUMMARY_YAML)
    }

    /// Templates from a YAML file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RenderError::Template(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RenderError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn list_templates(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
