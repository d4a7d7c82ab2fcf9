//! Arrangement planning: instrument requests → ordered track specs.
//!
//! Requests are sorted by priority, then the arrangement is adjusted for the
//! genre (drums for rhythmic genres), the stated complexity and any explicit
//! track count. Channels run upward from 0, skipping the drum channel.

use async_trait::async_trait;
use midigent_core::{
    Complexity, InstrumentRequest, InstrumentRole, ParameterSet, PipelineContext, Stage,
    StageError, StageId, StageOutput, TrackKind, TrackPlan, TrackSpec, DRUM_CHANNEL, MAX_TRACKS,
};
use midigent_intent::GenreRegistry;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks kept for simple or minimal arrangements
const SIMPLE_TRACKS: usize = 3;

const MELODIC_CHANNELS: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];

/// Used once the genre palette has nothing left to offer
static FILLER: Lazy<Vec<InstrumentRequest>> = Lazy::new(|| {
    use InstrumentRole::*;
    [
        ("strings", Pad, 4),
        ("piano", Harmony, 4),
        ("synth_arp", Arpeggio, 3),
        ("flute", Melody, 3),
        ("fx_atmosphere", Fx, 2),
        ("choir", Pad, 2),
        ("organ", Harmony, 2),
        ("harp", Arpeggio, 2),
        ("bells", Melody, 1),
        ("synth_pad", Pad, 1),
    ]
    .iter()
    .map(|&(name, role, priority)| request(name, role, priority))
    .collect()
});

pub struct PlanStage {
    registry: Arc<GenreRegistry>,
}

impl PlanStage {
    pub fn new(registry: Arc<GenreRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for PlanStage {
    fn id(&self) -> StageId {
        StageId::Plan
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to plan from".to_string()))?;

        let plan = arrange(parameters, &self.registry);
        if plan.tracks.is_empty() {
            return Err(StageError::ValidationFailed("plan has no tracks".to_string()));
        }

        info!(
            genre = %plan.genre,
            tracks = plan.tracks.len(),
            drums = plan.has_kind(TrackKind::Drums),
            "arrangement planned"
        );
        Ok(StageOutput::Planned(plan))
    }
}

/// Builds the track plan for a parameter set
pub fn arrange(parameters: &ParameterSet, registry: &GenreRegistry) -> TrackPlan {
    let profile = registry.resolve(&parameters.genre.primary);
    let palette = registry.palette(&profile.id);
    let rhythmic = profile.is_rhythmic();

    let mut requests: Vec<InstrumentRequest> = parameters
        .instruments_by_priority()
        .into_iter()
        .cloned()
        .collect();

    if rhythmic && !has_role(&requests, InstrumentRole::Rhythm) {
        let drums = pick(palette, &requests, InstrumentRole::Rhythm)
            .unwrap_or_else(|| request("drums", InstrumentRole::Rhythm, 9));
        debug!(instrument = %drums.name, "rhythmic genre without drums, adding");
        requests.push(drums);
    }

    let complexity = parameters.production.complexity;
    let minimal = complexity == Complexity::Simple
        || parameters
            .production
            .descriptors
            .iter()
            .any(|d| d.eq_ignore_ascii_case("minimal"));
    if minimal {
        trim(&mut requests, SIMPLE_TRACKS, rhythmic);
    } else if complexity >= Complexity::Rich {
        if !has_role(&requests, InstrumentRole::Harmony) {
            let harmony = pick(palette, &requests, InstrumentRole::Harmony)
                .unwrap_or_else(|| request("piano", InstrumentRole::Harmony, 5));
            requests.push(harmony);
        }
        if !has_role(&requests, InstrumentRole::Pad) {
            let pad = pick(palette, &requests, InstrumentRole::Pad)
                .unwrap_or_else(|| request("strings", InstrumentRole::Pad, 4));
            requests.push(pad);
        }
    }

    if let Some(count) = parameters.tracks.track_count {
        let count = (count as usize).clamp(1, MAX_TRACKS);
        if requests.len() > count {
            trim(&mut requests, count, rhythmic);
        } else {
            pad(&mut requests, count, palette);
        }
    }
    trim(&mut requests, MAX_TRACKS, rhythmic);
    requests.sort_by(|a, b| b.priority.cmp(&a.priority));

    TrackPlan {
        genre: profile.id.clone(),
        tracks: specs(&requests),
    }
}

/// Kinds, channels and sequential priorities (1 is the most important)
fn specs(requests: &[InstrumentRequest]) -> Vec<TrackSpec> {
    let mut lead_taken = false;
    let mut melodic = 0usize;

    requests
        .iter()
        .enumerate()
        .map(|(index, request)| {
            let kind = match TrackKind::for_role(request.role) {
                TrackKind::Lead if lead_taken => TrackKind::CounterMelody,
                TrackKind::Lead => {
                    lead_taken = true;
                    TrackKind::Lead
                }
                kind => kind,
            };
            let channel = if kind == TrackKind::Drums {
                DRUM_CHANNEL
            } else {
                let channel = MELODIC_CHANNELS[melodic % MELODIC_CHANNELS.len()];
                melodic += 1;
                channel
            };
            TrackSpec {
                kind,
                instrument: request.name.clone(),
                role: request.role,
                priority: (index + 1).min(u8::MAX as usize) as u8,
                channel,
            }
        })
        .collect()
}

fn request(name: &str, role: InstrumentRole, priority: u8) -> InstrumentRequest {
    InstrumentRequest {
        name: name.to_string(),
        role,
        priority,
    }
}

fn has_role(requests: &[InstrumentRequest], role: InstrumentRole) -> bool {
    requests.iter().any(|r| r.role == role)
}

fn is_used(requests: &[InstrumentRequest], name: &str) -> bool {
    requests.iter().any(|r| r.name == name)
}

/// First palette entry with this role that is not already in use
fn pick(
    palette: &[InstrumentRequest],
    requests: &[InstrumentRequest],
    role: InstrumentRole,
) -> Option<InstrumentRequest> {
    palette
        .iter()
        .find(|i| i.role == role && !is_used(requests, &i.name))
        .cloned()
}

/// Drops the lowest-priority requests until `limit` remain. Drums survive
/// when the genre needs them.
fn trim(requests: &mut Vec<InstrumentRequest>, limit: usize, keep_drums: bool) {
    requests.sort_by(|a, b| b.priority.cmp(&a.priority));
    while requests.len() > limit {
        let victim = requests
            .iter()
            .rposition(|r| !(keep_drums && r.role == InstrumentRole::Rhythm));
        match victim {
            Some(index) => {
                requests.remove(index);
            }
            None => break,
        }
    }
}

/// Grows the arrangement to `count`: unused palette entries first, then the
/// generic filler, then filler repeats.
fn pad(requests: &mut Vec<InstrumentRequest>, count: usize, palette: &[InstrumentRequest]) {
    let fresh: Vec<InstrumentRequest> = palette
        .iter()
        .chain(FILLER.iter())
        .filter(|i| i.role != InstrumentRole::Rhythm)
        .cloned()
        .collect();
    for candidate in fresh {
        if requests.len() >= count {
            return;
        }
        if !is_used(requests, &candidate.name) {
            requests.push(candidate);
        }
    }
    for candidate in FILLER.iter().cycle() {
        if requests.len() >= count {
            return;
        }
        requests.push(candidate.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::PipelineConfig;
    use midigent_intent::registry;

    fn instrument(name: &str, role: InstrumentRole, priority: u8) -> InstrumentRequest {
        request(name, role, priority)
    }

    fn ambient() -> ParameterSet {
        let mut parameters = ParameterSet::default();
        parameters.genre.primary = "ambient".to_string();
        parameters.instruments = vec![
            instrument("synth_pad", InstrumentRole::Pad, 8),
            instrument("piano", InstrumentRole::Melody, 6),
        ];
        parameters
    }

    #[test]
    fn test_default_pop_plan() {
        let plan = arrange(&ParameterSet::default(), registry());
        assert_eq!(plan.genre, "pop");
        assert_eq!(plan.tracks.len(), 4);

        let drums = &plan.tracks[0];
        assert_eq!(drums.kind, TrackKind::Drums);
        assert_eq!(drums.channel, DRUM_CHANNEL);

        let priorities: Vec<u8> = plan.tracks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
        let channels: Vec<u8> = plan.tracks[1..].iter().map(|t| t.channel).collect();
        assert_eq!(channels, vec![0, 1, 2]);
    }

    #[test]
    fn test_second_melody_becomes_counter_melody() {
        let mut parameters = ParameterSet::default();
        parameters.instruments.push(instrument("flute", InstrumentRole::Lead, 3));
        let plan = arrange(&parameters, registry());

        assert_eq!(plan.tracks.iter().filter(|t| t.kind == TrackKind::Lead).count(), 1);
        let counter = plan
            .tracks
            .iter()
            .find(|t| t.kind == TrackKind::CounterMelody)
            .unwrap();
        assert_eq!(counter.instrument, "flute");
    }

    #[test]
    fn test_beatless_genre_gets_no_drums() {
        let plan = arrange(&ambient(), registry());
        assert!(!plan.has_kind(TrackKind::Drums));
        assert_eq!(plan.tracks.len(), 2);
    }

    #[test]
    fn test_rhythmic_genre_gets_drums() {
        let mut parameters = ParameterSet::default();
        parameters.genre.primary = "rock".to_string();
        parameters.instruments.retain(|i| i.role != InstrumentRole::Rhythm);
        let plan = arrange(&parameters, registry());
        assert!(plan.has_kind(TrackKind::Drums));
    }

    #[test]
    fn test_track_count_pads_and_trims() {
        let mut parameters = ParameterSet::default();
        parameters.tracks.track_count = Some(7);
        let plan = arrange(&parameters, registry());
        assert_eq!(plan.tracks.len(), 7);

        parameters.tracks.track_count = Some(2);
        let plan = arrange(&parameters, registry());
        assert_eq!(plan.tracks.len(), 2);
        assert!(plan.has_kind(TrackKind::Drums));
    }

    #[test]
    fn test_track_count_capped_with_valid_channels() {
        let mut parameters = ParameterSet::default();
        parameters.tracks.track_count = Some(40);
        let plan = arrange(&parameters, registry());
        assert_eq!(plan.tracks.len(), MAX_TRACKS);
        for track in &plan.tracks {
            assert!(track.channel <= 15);
            assert_eq!(track.kind == TrackKind::Drums, track.channel == DRUM_CHANNEL);
        }
    }

    #[test]
    fn test_complexity_shapes_arrangement() {
        let mut parameters = ParameterSet::default();
        parameters.production.complexity = Complexity::Simple;
        let plan = arrange(&parameters, registry());
        assert!(plan.tracks.len() <= SIMPLE_TRACKS);
        assert!(plan.has_kind(TrackKind::Drums));

        parameters.production.complexity = Complexity::Rich;
        let plan = arrange(&parameters, registry());
        assert!(plan.has_kind(TrackKind::Pad));
        assert!(plan.has_kind(TrackKind::Harmony));
        assert_eq!(plan.tracks.len(), 5);
    }

    #[test]
    fn test_minimal_descriptor_trims() {
        let mut parameters = ParameterSet::default();
        parameters.production.descriptors.push("Minimal".to_string());
        let plan = arrange(&parameters, registry());
        assert_eq!(plan.tracks.len(), SIMPLE_TRACKS);
    }

    #[tokio::test]
    async fn test_stage_errors() {
        let stage = PlanStage::new(Arc::new(GenreRegistry::builtin().unwrap()));
        let mut ctx = PipelineContext::new("x", &PipelineConfig::default());
        assert!(matches!(stage.run(&ctx).await, Err(StageError::MissingInput(_))));

        let mut empty = ambient();
        empty.instruments.clear();
        ctx.parameters = Some(empty);
        assert!(matches!(stage.run(&ctx).await, Err(StageError::ValidationFailed(_))));
    }
}
