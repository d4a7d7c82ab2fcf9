//! Server settings.
//!
//! Read from the YAML file named by `MIDIGENT_CONFIG` when set, then
//! overridden field by field from the environment:
//!
//! - `MIDIGENT_ADDR`
//! - `MIDIGENT_OUTPUT_DIR`
//! - `MIDIGENT_MAX_ITERATIONS`
//! - `MIDIGENT_TELEMETRY_LOG`
//! - `MIDIGENT_SUMMARY_TEMPLATES`
//! - `MIDIGENT_PROVIDER_BASE_URL` registers an OpenAI-compatible provider,
//!   with `MIDIGENT_PROVIDER_NAME`, `MIDIGENT_PROVIDER_MODEL` and
//!   `MIDIGENT_PROVIDER_KEY_ENV` refining it.

use midigent_core::PipelineConfig;
use midigent_intent::ProviderConfig;
use midigent_quality::QualityProfile;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub const CONFIG_ENV: &str = "MIDIGENT_CONFIG";

const DEFAULT_PROVIDER_NAME: &str = "openai";
const DEFAULT_PROVIDER_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PROVIDER_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("SETTINGS/IO: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("SETTINGS/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("SETTINGS/INVALID: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub addr: String,
    /// Where `.mid` files go. None keeps artifacts in memory (hash only).
    pub output_dir: Option<PathBuf>,
    pub max_iterations: u32,
    /// JSON-lines telemetry file. None logs events through tracing.
    pub telemetry_log: Option<PathBuf>,
    /// Summary templates YAML replacing the built-in ones
    pub summary_templates: Option<PathBuf>,
    pub quality: QualityProfile,
    pub provider: Option<ProviderConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8787".to_string(),
            output_dir: None,
            max_iterations: PipelineConfig::default().max_iterations,
            telemetry_log: None,
            summary_templates: None,
            quality: QualityProfile::default(),
            provider: None,
        }
    }
}

impl Settings {
    /// File (if any) plus process environment
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|source| SettingsError::Io { path, source })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings
            .quality
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        Ok(settings)
    }

    /// Overrides from `lookup`, normally `std::env::var`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("MIDIGENT_ADDR") {
            self.addr = addr;
        }
        if let Some(dir) = lookup("MIDIGENT_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(max) = lookup("MIDIGENT_MAX_ITERATIONS") {
            self.max_iterations = max.trim().parse().map_err(|_| {
                SettingsError::Invalid(format!("MIDIGENT_MAX_ITERATIONS '{}' is not a count", max))
            })?;
        }
        if let Some(log) = lookup("MIDIGENT_TELEMETRY_LOG") {
            self.telemetry_log = Some(PathBuf::from(log));
        }
        if let Some(templates) = lookup("MIDIGENT_SUMMARY_TEMPLATES") {
            self.summary_templates = Some(PathBuf::from(templates));
        }

        if let Some(base_url) = lookup("MIDIGENT_PROVIDER_BASE_URL") {
            let name = lookup("MIDIGENT_PROVIDER_NAME").unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string());
            let model = lookup("MIDIGENT_PROVIDER_MODEL").unwrap_or_else(|| DEFAULT_PROVIDER_MODEL.to_string());
            let key_env = lookup("MIDIGENT_PROVIDER_KEY_ENV").unwrap_or_else(|| DEFAULT_PROVIDER_KEY_ENV.to_string());
            self.provider = Some(ProviderConfig::new(name, base_url, model).with_api_key_env(key_env));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default().with_max_iterations(self.max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.addr, "0.0.0.0:8787");
        assert_eq!(settings.max_iterations, 2);
        assert!(settings.provider.is_none());
        assert_eq!(settings.pipeline_config(), PipelineConfig::default());
    }

    #[test]
    fn test_yaml_then_env() {
        let yaml = r#"
addr: "127.0.0.1:9000"
max_iterations: 4
quality:
  refine_below: 0.7
provider:
  name: local
  base_url: "http://localhost:11434/v1"
  model: llama3
"#;
        let mut settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.addr, "127.0.0.1:9000");
        assert_eq!(settings.quality.refine_below, 0.7);
        assert_eq!(settings.provider.as_ref().unwrap().timeout_secs, 30);

        settings
            .apply_env(env(&[
                ("MIDIGENT_MAX_ITERATIONS", "1"),
                ("MIDIGENT_OUTPUT_DIR", "/tmp/midi"),
                ("MIDIGENT_SUMMARY_TEMPLATES", "/etc/midigent/summary.yaml"),
            ]))
            .unwrap();
        assert_eq!(settings.max_iterations, 1);
        assert_eq!(settings.output_dir, Some(PathBuf::from("/tmp/midi")));
        assert_eq!(
            settings.summary_templates,
            Some(PathBuf::from("/etc/midigent/summary.yaml"))
        );
        assert_eq!(settings.addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_provider_from_env() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[("MIDIGENT_PROVIDER_BASE_URL", "https://api.example.com/v1")]))
            .unwrap();
        let provider = settings.provider.unwrap();
        assert_eq!(provider.name, DEFAULT_PROVIDER_NAME);
        assert_eq!(provider.model, DEFAULT_PROVIDER_MODEL);
        assert_eq!(provider.api_key_env.as_deref(), Some(DEFAULT_PROVIDER_KEY_ENV));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.apply_env(env(&[("MIDIGENT_MAX_ITERATIONS", "lots")])),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(Settings::from_yaml("addr: [1"), Err(SettingsError::Parse(_))));
    }
}
