use async_trait::async_trait;
use midigent_compose::{SummaryFacts, SummaryRenderer, TrackFacts};
use midigent_core::{PipelineContext, Stage, StageError, StageId, StageOutput, MIDIGENT_VERSION};

/// Closing Markdown for a run, successful or not
pub struct SummarizeStage {
    renderer: SummaryRenderer,
}

impl SummarizeStage {
    pub fn new(renderer: SummaryRenderer) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Stage for SummarizeStage {
    fn id(&self) -> StageId {
        StageId::Summarize
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let facts = facts(ctx);
        let text = if ctx.is_failed() {
            self.renderer.failure(&facts)
        } else {
            self.renderer.success(&facts)
        }
        .map_err(|e| StageError::ExecutionFailed(e.to_string()))?;

        Ok(StageOutput::Summarized(text))
    }
}

/// Whatever the context reached, flattened for the templates
pub fn facts(ctx: &PipelineContext) -> SummaryFacts {
    let mut facts = SummaryFacts {
        version: MIDIGENT_VERSION.to_string(),
        correlation_id: ctx.correlation_id.clone(),
        request: ctx.request_text.clone(),
        tracks: ctx
            .tracks
            .iter()
            .map(|t| TrackFacts {
                name: t.name.clone(),
                instrument: t.instrument.clone(),
                notes: t.notes.len(),
            })
            .collect(),
        score: ctx.quality.as_ref().map(|q| q.score),
        iterations: ctx.current_iteration,
        max_iterations: ctx.max_iterations,
        refinements: ctx.refinement_notes.clone(),
        artifact: ctx.artifact.as_ref().map(|a| a.id.clone()),
        location: ctx
            .artifact
            .as_ref()
            .and_then(|a| a.location.as_ref())
            .map(|p| p.display().to_string()),
        origin: ctx.extraction.as_ref().map(|e| e.origin.to_string()),
        stage: ctx.error.as_ref().map(|e| e.stage.to_string()),
        message: ctx.error.as_ref().map(|e| e.message.clone()),
        ..SummaryFacts::default()
    };

    if let Some(p) = &ctx.parameters {
        facts.genre = Some(p.genre.primary.clone());
        facts.mood = Some(p.mood.primary.clone());
        facts.energy = Some(p.energy.level.to_string());
        facts.tempo = Some(p.tempo.bpm);
        facts.key = Some(p.key.to_string());
        facts.time_signature = Some(p.time_signature.to_string());
        facts.bars = Some(p.duration.bars);
        facts.seconds = Some(p.duration.seconds);
        facts.tags = p.production.descriptors.clone();
        facts.confidence = Some(p.overall_confidence);
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::{ArtifactHandle, ParameterSet, PipelineConfig, StageFailure};

    fn stage() -> SummarizeStage {
        SummarizeStage::new(SummaryRenderer::builtin().unwrap())
    }

    async fn summary(ctx: &PipelineContext) -> String {
        match stage().run(ctx).await.unwrap() {
            StageOutput::Summarized(text) => text,
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_summary() {
        let mut ctx = PipelineContext::new("pop song", &PipelineConfig::default());
        ctx.parameters = Some(ParameterSet::default());
        ctx.artifact = Some(ArtifactHandle {
            id: "blake3:abc".to_string(),
            mime: "audio/midi".to_string(),
            byte_len: 10,
            location: None,
        });

        let text = summary(&ctx).await;
        assert!(text.starts_with("## Composition Summary"));
        assert!(text.contains("pop"));
        assert!(text.contains("120 BPM"));
        assert!(text.contains("blake3:abc"));
        assert!(text.contains(&ctx.correlation_id));
    }

    #[tokio::test]
    async fn test_failure_summary_from_empty_context() {
        let mut ctx = PipelineContext::new("", &PipelineConfig::default());
        ctx.error = Some(StageFailure {
            stage: StageId::Plan,
            message: "STAGE/VALIDATION: plan has no tracks".to_string(),
        });

        let text = summary(&ctx).await;
        assert!(text.starts_with("## Composition Failed"));
        assert!(text.contains("**plan**"));
        assert!(text.contains("plan has no tracks"));
    }

    #[test]
    fn test_facts_follow_context() {
        let mut ctx = PipelineContext::new("x", &PipelineConfig::default());
        assert_eq!(facts(&ctx).genre, None);

        ctx.parameters = Some(ParameterSet::default());
        ctx.refinement_notes.push("pass 1: reseeded".to_string());
        let f = facts(&ctx);
        assert_eq!(f.key.as_deref(), Some("C major"));
        assert_eq!(f.time_signature.as_deref(), Some("4/4"));
        assert_eq!(f.refinements.len(), 1);
        assert_eq!(f.max_iterations, 2);
    }
}
