//! Stage Trait: the single contract every pipeline stage implements
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::PipelineContext;
use crate::data_model::{ExtractionReport, ParameterSet};
use crate::material::{ArtifactHandle, TheoryReport, Track, TrackPlan};
use crate::quality::QualityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Understand,
    Plan,
    ValidateTheory,
    Generate,
    AssessQuality,
    Refine,
    Finalize,
    Summarize,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Understand => "understand",
            Self::Plan => "plan",
            Self::ValidateTheory => "validate_theory",
            Self::Generate => "generate",
            Self::AssessQuality => "assess_quality",
            Self::Refine => "refine",
            Self::Finalize => "finalize",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage hands back to the orchestrator. Each variant maps onto the
/// context fields owned by exactly one stage.
#[derive(Debug, Clone)]
pub enum StageOutput {
    Understood {
        parameters: ParameterSet,
        report: ExtractionReport,
    },
    Planned(TrackPlan),
    TheoryChecked(TheoryReport),
    Generated(Vec<Track>),
    Assessed(QualityReport),
    Refined {
        /// (track index, regenerated track)
        replacements: Vec<(usize, Track)>,
        note: String,
    },
    Finalized(ArtifactHandle),
    Summarized(String),
}

impl StageOutput {
    /// The stage allowed to produce this output
    pub fn owner(&self) -> StageId {
        match self {
            Self::Understood { .. } => StageId::Understand,
            Self::Planned(_) => StageId::Plan,
            Self::TheoryChecked(_) => StageId::ValidateTheory,
            Self::Generated(_) => StageId::Generate,
            Self::Assessed(_) => StageId::AssessQuality,
            Self::Refined { .. } => StageId::Refine,
            Self::Finalized(_) => StageId::Finalize,
            Self::Summarized(_) => StageId::Summarize,
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Whether the stage gives the same output for the same context
    fn deterministic(&self) -> bool {
        true
    }

    /// Reads the context and produces this stage's output. Never writes.
    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageError {
    MissingInput(String),
    ValidationFailed(String),
    ExecutionFailed(String),
    ProviderUnavailable(String),
    SchemaMismatch { expected: String, got: String },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingInput(msg) => write!(f, "STAGE/INPUT: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "STAGE/VALIDATION: {}", msg),
            Self::ExecutionFailed(msg) => write!(f, "STAGE/EXEC: {}", msg),
            Self::ProviderUnavailable(msg) => write!(f, "PROVIDER/UNAVAILABLE: {}", msg),
            Self::SchemaMismatch { expected, got } => {
                write!(f, "SCHEMA/MISMATCH: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for StageError {}

/// The eight stages of the graph, one slot each
pub struct StageSet {
    pub understand: Box<dyn Stage>,
    pub plan: Box<dyn Stage>,
    pub validate_theory: Box<dyn Stage>,
    pub generate: Box<dyn Stage>,
    pub assess_quality: Box<dyn Stage>,
    pub refine: Box<dyn Stage>,
    pub finalize: Box<dyn Stage>,
    pub summarize: Box<dyn Stage>,
}

impl StageSet {
    pub fn get(&self, id: StageId) -> &dyn Stage {
        match id {
            StageId::Understand => self.understand.as_ref(),
            StageId::Plan => self.plan.as_ref(),
            StageId::ValidateTheory => self.validate_theory.as_ref(),
            StageId::Generate => self.generate.as_ref(),
            StageId::AssessQuality => self.assess_quality.as_ref(),
            StageId::Refine => self.refine.as_ref(),
            StageId::Finalize => self.finalize.as_ref(),
            StageId::Summarize => self.summarize.as_ref(),
        }
    }
}
