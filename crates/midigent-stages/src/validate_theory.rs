use async_trait::async_trait;
use midigent_core::{
    EnergyLevel, ParameterSet, PipelineContext, Stage, StageError, StageId, StageOutput,
    TheoryNote, TheoryNoteLevel, TheoryReport, TrackKind, TrackPlan,
};
use midigent_intent::GenreRegistry;
use std::sync::Arc;
use tracing::info;

/// Checks the plan against the genre. Observations never block the
/// pipeline; only a missing plan does.
pub struct ValidateTheoryStage {
    registry: Arc<GenreRegistry>,
}

impl ValidateTheoryStage {
    pub fn new(registry: Arc<GenreRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for ValidateTheoryStage {
    fn id(&self) -> StageId {
        StageId::ValidateTheory
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let plan = ctx
            .plan
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no plan to validate".to_string()))?;
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to validate against".to_string()))?;

        let report = check(parameters, plan, &self.registry);
        info!(
            notes = report.notes.len(),
            warnings = report.warnings(),
            "theory checked"
        );
        Ok(StageOutput::TheoryChecked(report))
    }
}

pub fn check(parameters: &ParameterSet, plan: &TrackPlan, registry: &GenreRegistry) -> TheoryReport {
    let profile = registry.resolve(&plan.genre);
    let palette = registry.palette(&profile.id);
    let mut notes = Vec::new();
    let mut note = |level, check: &str, message: String| {
        notes.push(TheoryNote {
            level,
            check: check.to_string(),
            message,
        })
    };

    for track in &plan.tracks {
        if track.kind != TrackKind::Drums && !palette.iter().any(|i| i.name == track.instrument) {
            note(
                TheoryNoteLevel::Info,
                "atypical_instrument",
                format!("{} is unusual for {}", track.instrument, profile.name),
            );
        }
    }

    let energetic = parameters.energy.level >= EnergyLevel::High;
    if energetic && !plan.tracks.iter().any(|t| t.kind.is_harmonic()) {
        note(
            TheoryNoteLevel::Warning,
            "harmonic_support",
            format!(
                "{} energy with no harmony, pad or arpeggio underneath",
                parameters.energy.level
            ),
        );
    }

    if profile.is_rhythmic() && !plan.has_kind(TrackKind::Drums) {
        note(
            TheoryNoteLevel::Warning,
            "rhythm_section",
            format!("{} usually carries drums", profile.name),
        );
    }

    if !plan.tracks.iter().any(|t| t.kind.is_melodic()) {
        note(
            TheoryNoteLevel::Warning,
            "melody",
            "no lead, counter-melody or arpeggio track".to_string(),
        );
    }

    let bpm = parameters.tempo.bpm;
    if !profile.tempo_in_band(bpm) {
        note(
            TheoryNoteLevel::Info,
            "tempo_band",
            format!(
                "{} BPM is outside the usual {}-{} for {}",
                bpm, profile.tempo_min, profile.tempo_max, profile.name
            ),
        );
    }

    TheoryReport { notes }
}
