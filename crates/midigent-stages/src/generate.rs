use async_trait::async_trait;
use midigent_compose::{realize, GenerationParams, TrackGenerator};
use midigent_core::{PipelineContext, Stage, StageError, StageId, StageOutput, Track, TrackPlan};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

/// Seed of one track's generator: the request seed, the seed family (the
/// loop iteration, or an escalated family after repeated failures) and the
/// track's position in the plan.
pub(crate) fn track_seed(seed: u64, family: u64, index: usize) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&family.to_le_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Realizes one planned track with its own seeded rng
pub(crate) fn render_track(
    generator: &dyn TrackGenerator,
    plan: &TrackPlan,
    index: usize,
    params: &GenerationParams,
    seed: u64,
) -> Option<Track> {
    let spec = plan.tracks.get(index)?;
    let mut rng = StdRng::seed_from_u64(seed);
    Some(realize(generator, spec, params, &mut rng))
}

pub struct GenerateStage {
    generator: Arc<dyn TrackGenerator>,
}

impl GenerateStage {
    pub fn new(generator: Arc<dyn TrackGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for GenerateStage {
    fn id(&self) -> StageId {
        StageId::Generate
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to generate from".to_string()))?;
        let plan = ctx
            .plan
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no plan to generate from".to_string()))?;

        let params = GenerationParams::from_parameters(parameters);
        let seed = ctx.seed();
        let family = ctx.current_iteration as u64;
        let tracks: Vec<Track> = (0..plan.tracks.len())
            .filter_map(|index| {
                render_track(
                    self.generator.as_ref(),
                    plan,
                    index,
                    &params,
                    track_seed(seed, family, index),
                )
            })
            .collect();

        info!(
            tracks = tracks.len(),
            notes = tracks.iter().map(|t| t.notes.len()).sum::<usize>(),
            bars = params.bars,
            "tracks generated"
        );
        Ok(StageOutput::Generated(tracks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::arrange;
    use midigent_compose::HeuristicGenerator;
    use midigent_core::{Note, ParameterSet, PipelineConfig, TrackSpec};
    use midigent_intent::registry;
    use rand::Rng;

    /// One note per track, pitch drawn from the rng
    struct OneNote;

    impl TrackGenerator for OneNote {
        fn generate(&self, spec: &TrackSpec, _params: &GenerationParams, rng: &mut StdRng) -> Vec<Note> {
            vec![Note::new(rng.gen_range(40..90), 0.0, 1.0, 80, spec.channel)]
        }
    }

    fn context() -> PipelineContext {
        let mut ctx = PipelineContext::new("pop song", &PipelineConfig::default());
        let parameters = ParameterSet::default();
        ctx.plan = Some(arrange(&parameters, registry()));
        ctx.parameters = Some(parameters);
        ctx
    }

    async fn tracks(stage: &GenerateStage, ctx: &PipelineContext) -> Vec<Track> {
        match stage.run(ctx).await.unwrap() {
            StageOutput::Generated(tracks) => tracks,
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_track_seed_varies_by_each_input() {
        let base = track_seed(1, 0, 0);
        assert_eq!(base, track_seed(1, 0, 0));
        assert_ne!(base, track_seed(2, 0, 0));
        assert_ne!(base, track_seed(1, 1, 0));
        assert_ne!(base, track_seed(1, 0, 1));
    }

    #[tokio::test]
    async fn test_one_track_per_planned_slot() {
        let ctx = context();
        let stage = GenerateStage::new(Arc::new(OneNote));
        let tracks = tracks(&stage, &ctx).await;

        let plan = ctx.plan.as_ref().unwrap();
        assert_eq!(tracks.len(), plan.tracks.len());
        for (track, spec) in tracks.iter().zip(&plan.tracks) {
            assert_eq!(track.kind, spec.kind);
            assert_eq!(track.channel, spec.channel);
            assert_eq!(track.notes.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_same_context_same_material() {
        let ctx = context();
        let stage = GenerateStage::new(Arc::new(HeuristicGenerator));
        assert_eq!(tracks(&stage, &ctx).await, tracks(&stage, &ctx).await);

        let other = PipelineContext {
            correlation_id: "another-request".to_string(),
            ..ctx.clone()
        };
        assert_ne!(tracks(&stage, &ctx).await, tracks(&stage, &other).await);
    }

    #[tokio::test]
    async fn test_missing_inputs() {
        let stage = GenerateStage::new(Arc::new(OneNote));
        let mut ctx = context();
        ctx.plan = None;
        assert!(matches!(stage.run(&ctx).await, Err(StageError::MissingInput(_))));
        ctx.parameters = None;
        assert!(matches!(stage.run(&ctx).await, Err(StageError::MissingInput(_))));
    }
}
