//! midigent quality: scores generated material and decides whether the
//! refinement loop should take another pass.
//!
//! # Example
//!
//! ```ignore
//! use midigent_quality::{Assessment, QualityAssessor};
//!
//! let assessor = QualityAssessor::default();
//! let report = assessor.assess(&Assessment {
//!     parameters: &params,
//!     plan: &plan,
//!     tracks: &tracks,
//!     history: &ctx.quality_history,
//!     iteration: ctx.current_iteration,
//!     rhythmic_genre: true,
//! });
//! println!("score {} refine {}", report.score, report.needs_refinement);
//! ```

pub mod assessor;
pub mod checks;
pub mod profile;

pub use assessor::{fingerprint, Assessment, QualityAssessor};
pub use checks::{expected_tracks, DimensionResult, Material};
pub use profile::{DimensionWeights, ProfileError, QualityProfile};
