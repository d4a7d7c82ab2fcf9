//! midigent core: data model, pipeline context, stage contract and the
//! stage-graph orchestrator.
//!
//! Stages never mutate the context directly. Each stage reads a
//! `&PipelineContext` and returns a [`StageOutput`]; the [`StageGraph`]
//! applies that output to the fields the stage owns.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod material;
pub mod quality;
pub mod runner;
pub mod stage;
pub mod telemetry;

pub use config::PipelineConfig;
pub use context::{PipelineContext, StageFailure, StageStatus, StageTrace, CONTEXT_VERSION};
pub use data_model::{
    canonical_root, pitch_class, Action, Complexity, Duration, Dynamics, DynamicsArc, Energy,
    EnergyLevel, ExtractedNumbers, ExtractionOrigin, ExtractionReport, Genre, InstrumentRequest,
    InstrumentRole, Intensity, Key, Mood, ParameterSet, Production, Reference, Scale, Structure,
    Tempo, TempoSource, TimeSignature, TrackRequest, Vocabulary,
};
pub use error::MidigentError;
pub use material::{
    ArtifactHandle, Note, TheoryNote, TheoryNoteLevel, TheoryReport, Track, TrackKind, TrackPlan,
    TrackSpec, BEATS_PER_BAR, DRUM_CHANNEL, MAX_TRACKS,
};
pub use quality::{DimensionScores, Issue, IssueCategory, QualityHistory, QualityReport, Severity};
pub use runner::StageGraph;
pub use stage::{Stage, StageError, StageId, StageOutput, StageSet};
pub use telemetry::{
    JsonlSink, MemorySink, NullSink, PipelineEvent, TelemetryError, TelemetrySink, TracingSink,
};

/// Engine version stamped into summaries and API responses
pub const MIDIGENT_VERSION: &str = "1.0.0";
