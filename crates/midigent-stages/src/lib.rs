//! midigent stages: the eight pipeline stages and the [`Composer`] that
//! wires them into a stage graph.
//!
//! # Pipeline Flow
//!
//! ```text
//! text → understand → plan → validate_theory → generate → assess_quality → finalize → summarize
//!           ↓          ↓           ↓              ↓            ↕ refine        ↓           ↓
//!      ParameterSet  TrackPlan  TheoryReport    Tracks    QualityReport    Artifact    Markdown
//! ```
//!
//! Each stage reads the context and returns its output; none of them
//! mutate it. Collaborators (provider, generator, serializer) are trait
//! objects and can be swapped through [`ComposerBuilder`].
//!
//! # Example
//!
//! ```ignore
//! use midigent_core::PipelineConfig;
//! use midigent_stages::Composer;
//!
//! let composer = Composer::offline()?;
//! let ctx = composer.run("120 BPM lofi beat", None, &PipelineConfig::default()).await;
//! println!("{}", ctx.summary.unwrap_or_default());
//! ```

mod assess_quality;
mod composer;
mod finalize;
mod generate;
mod plan;
mod refine;
mod summarize;
mod understand;
mod validate_theory;

pub use assess_quality::AssessQualityStage;
pub use composer::{Composer, ComposerBuilder, ComposerError};
pub use finalize::FinalizeStage;
pub use generate::GenerateStage;
pub use plan::{arrange, PlanStage};
pub use refine::RefineStage;
pub use summarize::{facts as summary_facts, SummarizeStage};
pub use understand::UnderstandStage;
pub use validate_theory::{check as check_theory, ValidateTheoryStage};
