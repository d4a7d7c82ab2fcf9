//! One refinement pass over the generated tracks.
//!
//! Only high and critical issues drive targeted regeneration. An issue
//! implicates its own track, or every track when it is global, and selects
//! the alternate parameters used to regenerate:
//!
//! | category            | regeneration              |
//! |---------------------|---------------------------|
//! | technical, density  | energy raised one level   |
//! | harmony             | voiced as block chords    |
//! | repetition          | fresh pattern variation   |
//! | duration            | fitted to requested bars  |
//! | anything else       | fresh seed                |
//!
//! A pass triggered by score alone reseeds every track. When the last two
//! reports failed the same way, the pass escalates to a full reseed in a
//! separate seed family.

use async_trait::async_trait;
use midigent_compose::{fit_to_length, GenerationParams, TrackGenerator};
use midigent_core::{
    IssueCategory, ParameterSet, PipelineContext, Severity, Stage, StageError, StageId,
    StageOutput, Track,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::generate::{render_track, track_seed};

/// Escalated seed families start here, clear of the per-pass families
const ESCALATION_FAMILY: u64 = 1 << 32;

/// Alternate parameters for one regenerated track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Adjustment {
    raise_energy: bool,
    as_chords: bool,
    fresh_variation: bool,
    requested_length: bool,
}

impl Adjustment {
    fn for_category(category: IssueCategory) -> Self {
        match category {
            IssueCategory::Technical | IssueCategory::Density => Self {
                raise_energy: true,
                ..Self::default()
            },
            IssueCategory::Harmony => Self {
                as_chords: true,
                ..Self::default()
            },
            IssueCategory::Repetition => Self {
                fresh_variation: true,
                ..Self::default()
            },
            IssueCategory::Duration => Self {
                requested_length: true,
                ..Self::default()
            },
            IssueCategory::Arrangement | IssueCategory::Genre | IssueCategory::Instrumentation => {
                Self::default()
            }
        }
    }

    fn reseed() -> Self {
        Self {
            fresh_variation: true,
            ..Self::default()
        }
    }

    fn merge(&mut self, other: Self) {
        self.raise_energy |= other.raise_energy;
        self.as_chords |= other.as_chords;
        self.fresh_variation |= other.fresh_variation;
        self.requested_length |= other.requested_length;
    }

    fn apply(&self, base: &GenerationParams, parameters: &ParameterSet, pass: u32) -> GenerationParams {
        let mut params = base.clone();
        if self.raise_energy {
            params.energy = parameters.energy.level.raised();
        }
        if self.as_chords {
            params.as_chords = true;
        }
        if self.fresh_variation {
            params.variation = pass;
        }
        params
    }

    /// Post-generation fixes that parameters alone cannot express
    fn finish(&self, track: &mut Track, params: &GenerationParams) {
        if self.requested_length {
            fit_to_length(track, params.total_beats());
        }
    }

    fn describe(&self) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.raise_energy {
            parts.push("raised energy");
        }
        if self.as_chords {
            parts.push("chords");
        }
        if self.fresh_variation {
            parts.push("new variation");
        }
        if self.requested_length {
            parts.push("requested length");
        }
        if parts.is_empty() {
            parts.push("new seed");
        }
        parts
    }
}

pub struct RefineStage {
    generator: Arc<dyn TrackGenerator>,
}

impl RefineStage {
    pub fn new(generator: Arc<dyn TrackGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for RefineStage {
    fn id(&self) -> StageId {
        StageId::Refine
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to refine with".to_string()))?;
        let plan = ctx
            .plan
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no plan to refine against".to_string()))?;
        let report = ctx
            .quality
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no quality report to refine from".to_string()))?;
        if ctx.tracks.is_empty() {
            return Err(StageError::MissingInput("no tracks to refine".to_string()));
        }

        let pass = ctx.current_iteration + 1;
        let count = ctx.tracks.len();
        let everything = |adjustment: Adjustment| -> BTreeMap<usize, Adjustment> {
            (0..count).map(|index| (index, adjustment)).collect()
        };

        let escalated = ctx.quality_history.repeated_failure();
        let (targets, family, note) = if escalated {
            let family = ESCALATION_FAMILY + pass as u64;
            warn!(pass, family, "same issues as the previous pass, escalating to a full reseed");
            let note = format!(
                "pass {}: same issues as the previous pass, reseeded all {} tracks in seed family {}",
                pass, count, family
            );
            (everything(Adjustment::reseed()), family, note)
        } else {
            let mut targets: BTreeMap<usize, Adjustment> = BTreeMap::new();
            for issue in report.issues_at_least(Severity::High) {
                let adjustment = Adjustment::for_category(issue.category);
                let indices: Vec<usize> = match issue.track_index {
                    Some(index) if index < count => vec![index],
                    Some(_) => Vec::new(),
                    None => (0..count).collect(),
                };
                for index in indices {
                    targets.entry(index).or_default().merge(adjustment);
                }
            }

            if targets.is_empty() {
                let note = format!(
                    "pass {}: score {:.2} below threshold, reseeded all {} tracks",
                    pass, report.score, count
                );
                (everything(Adjustment::reseed()), pass as u64, note)
            } else {
                let changes: Vec<String> = targets
                    .iter()
                    .map(|(&index, adjustment)| {
                        format!("{} ({})", ctx.tracks[index].name, adjustment.describe().join(", "))
                    })
                    .collect();
                let note = format!("pass {}: regenerated {}", pass, changes.join("; "));
                (targets, pass as u64, note)
            }
        };

        let base = GenerationParams::from_parameters(parameters);
        let seed = ctx.seed();
        let replacements: Vec<_> = targets
            .iter()
            .filter_map(|(&index, adjustment)| {
                let params = adjustment.apply(&base, parameters, pass);
                render_track(
                    self.generator.as_ref(),
                    plan,
                    index,
                    &params,
                    track_seed(seed, family, index),
                )
                .map(|mut track| {
                    adjustment.finish(&mut track, &params);
                    (index, track)
                })
            })
            .collect();

        info!(pass, replaced = replacements.len(), escalated, "refinement pass");
        Ok(StageOutput::Refined { replacements, note })
    }
}
