//! Per-call pipeline configuration
//!
//! Passed explicitly into every `run`; nothing here is global.
use serde::{Deserialize, Serialize};

use crate::error::MidigentError;
use crate::quality::QualityHistory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on refine executions per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Name of the understanding provider to use instead of the default
    #[serde(default)]
    pub provider_override: Option<String>,

    /// Quality reports kept per request
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_max_iterations() -> u32 {
    2
}

fn default_history_capacity() -> usize {
    QualityHistory::DEFAULT_CAPACITY
}

impl PipelineConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    /// Load from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, MidigentError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Hard cap on stage executions for one run: the eight nominal stages
    /// plus two per refinement pass.
    pub fn stage_budget(&self) -> usize {
        stage_budget(self.max_iterations)
    }
}

pub fn stage_budget(max_iterations: u32) -> usize {
    8 + 2 * max_iterations as usize
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            provider_override: None,
            history_capacity: default_history_capacity(),
        }
    }
}
