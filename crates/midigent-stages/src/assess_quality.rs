use async_trait::async_trait;
use midigent_core::{PipelineContext, Stage, StageError, StageId, StageOutput};
use midigent_intent::GenreRegistry;
use midigent_quality::{Assessment, QualityAssessor};
use std::sync::Arc;

pub struct AssessQualityStage {
    assessor: QualityAssessor,
    registry: Arc<GenreRegistry>,
}

impl AssessQualityStage {
    pub fn new(assessor: QualityAssessor, registry: Arc<GenreRegistry>) -> Self {
        Self { assessor, registry }
    }
}

#[async_trait]
impl Stage for AssessQualityStage {
    fn id(&self) -> StageId {
        StageId::AssessQuality
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let parameters = ctx
            .parameters
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no parameters to assess against".to_string()))?;
        let plan = ctx
            .plan
            .as_ref()
            .ok_or_else(|| StageError::MissingInput("no plan to assess against".to_string()))?;

        let report = self.assessor.assess(&Assessment {
            parameters,
            plan,
            tracks: &ctx.tracks,
            history: &ctx.quality_history,
            iteration: ctx.current_iteration,
            rhythmic_genre: self.registry.resolve(&plan.genre).is_rhythmic(),
        });
        Ok(StageOutput::Assessed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::{IssueCategory, ParameterSet, PipelineConfig, Severity, TrackPlan};
    use midigent_quality::QualityProfile;

    fn stage() -> AssessQualityStage {
        AssessQualityStage::new(
            QualityAssessor::new(QualityProfile::default()),
            Arc::new(GenreRegistry::builtin().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_no_tracks_is_critical() {
        let mut ctx = PipelineContext::new("x", &PipelineConfig::default());
        ctx.parameters = Some(ParameterSet::default());
        ctx.plan = Some(TrackPlan {
            genre: "pop".to_string(),
            tracks: vec![],
        });

        let report = match stage().run(&ctx).await.unwrap() {
            StageOutput::Assessed(report) => report,
            other => panic!("unexpected output {:?}", other),
        };
        assert!(report.needs_refinement);
        assert!(report
            .issues
            .iter()
            .any(|i| i.category == IssueCategory::Technical && i.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn test_requires_plan() {
        let mut ctx = PipelineContext::new("x", &PipelineConfig::default());
        ctx.parameters = Some(ParameterSet::default());
        assert!(matches!(stage().run(&ctx).await, Err(StageError::MissingInput(_))));
    }
}
