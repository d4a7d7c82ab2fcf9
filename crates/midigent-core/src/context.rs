//! Pipeline Context: the one record threaded through every stage.
//!
//! Stages get it read-only. Writes happen in [`PipelineContext::apply`],
//! which only the orchestrator calls, one `StageOutput` variant per owning
//! stage.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data_model::{ExtractionReport, ParameterSet};
use crate::material::{ArtifactHandle, TheoryReport, Track, TrackPlan};
use crate::quality::{QualityHistory, QualityReport};
use crate::stage::{StageId, StageOutput};

/// Bumped whenever a field is added to or removed from the context
pub const CONTEXT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageId,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: StageId,
    pub status: StageStatus,
    pub in_hash: String,
    pub out_hash: String,
    pub deterministic: bool,
    pub latency_ms: u64,
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    pub version: u32,
    pub correlation_id: String,
    pub parent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // === Inputs ===
    pub request_text: String,
    pub prior_parameters: Option<ParameterSet>,
    pub provider_override: Option<String>,

    // === understand ===
    pub parameters: Option<ParameterSet>,
    pub extraction: Option<ExtractionReport>,

    // === plan / validate_theory ===
    pub plan: Option<TrackPlan>,
    pub theory: Option<TheoryReport>,

    // === generate / refine ===
    pub tracks: Vec<Track>,
    pub refinement_notes: Vec<String>,

    // === assess_quality ===
    pub quality: Option<QualityReport>,
    pub quality_history: QualityHistory,

    // === finalize / summarize ===
    pub artifact: Option<ArtifactHandle>,
    pub summary: Option<String>,

    // === Control ===
    pub error: Option<StageFailure>,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub trace: Vec<StageTrace>,
}

impl PipelineContext {
    pub fn new(request_text: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            version: CONTEXT_VERSION,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            parent_id: None,
            started_at: Utc::now(),
            finished_at: None,
            request_text: request_text.into(),
            prior_parameters: None,
            provider_override: config.provider_override.clone(),
            parameters: None,
            extraction: None,
            plan: None,
            theory: None,
            tracks: Vec::new(),
            refinement_notes: Vec::new(),
            quality: None,
            quality_history: QualityHistory::with_capacity(config.history_capacity),
            artifact: None,
            summary: None,
            error: None,
            current_iteration: 0,
            max_iterations: config.max_iterations,
            trace: Vec::new(),
        }
    }

    /// Continues a session: keeps the prior intent as context for the next
    /// request.
    pub fn following(
        request_text: impl Into<String>,
        prior: Option<&PipelineContext>,
        config: &PipelineConfig,
    ) -> Self {
        let mut ctx = Self::new(request_text, config);
        if let Some(prior) = prior {
            ctx.parent_id = Some(prior.correlation_id.clone());
            ctx.prior_parameters = prior.parameters.clone();
        }
        ctx
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Finished without error and holds an artifact
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.artifact.is_some()
    }

    /// Seed for note generation, stable for the lifetime of a request
    pub fn seed(&self) -> u64 {
        let hash = blake3::hash(self.correlation_id.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Number of refine executions recorded in the trace
    pub fn refine_count(&self) -> usize {
        self.trace
            .iter()
            .filter(|t| t.stage == StageId::Refine && t.status == StageStatus::Completed)
            .count()
    }

    /// "blake3:<hex>" of the serialized context
    pub fn state_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("blake3:{}", blake3::hash(&bytes))
    }

    /// Writes a stage output into the fields owned by that stage
    pub(crate) fn apply(&mut self, output: StageOutput) {
        match output {
            StageOutput::Understood { parameters, report } => {
                self.parameters = Some(parameters);
                self.extraction = Some(report);
            }
            StageOutput::Planned(plan) => self.plan = Some(plan),
            StageOutput::TheoryChecked(report) => self.theory = Some(report),
            StageOutput::Generated(tracks) => self.tracks = tracks,
            StageOutput::Assessed(report) => {
                self.quality_history.push(report.clone());
                self.quality = Some(report);
            }
            StageOutput::Refined { replacements, note } => {
                for (index, track) in replacements {
                    if let Some(slot) = self.tracks.get_mut(index) {
                        *slot = track;
                    }
                }
                self.refinement_notes.push(note);
                self.current_iteration += 1;
            }
            StageOutput::Finalized(handle) => self.artifact = Some(handle),
            StageOutput::Summarized(text) => self.summary = Some(text),
        }
    }

    pub(crate) fn fail(&mut self, stage: StageId, message: String) {
        self.error = Some(StageFailure { stage, message });
    }
}
