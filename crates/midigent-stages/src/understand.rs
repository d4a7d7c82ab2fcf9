use async_trait::async_trait;
use midigent_core::{PipelineContext, Stage, StageError, StageId, StageOutput};
use midigent_intent::{IntentEngine, ProviderRegistry, UnderstandingProvider};
use std::sync::Arc;
use tracing::warn;

/// Text → ParameterSet through the intent engine. Never fails: the engine
/// falls back to keyword extraction on any provider trouble.
pub struct UnderstandStage {
    engine: Arc<IntentEngine>,
    providers: Arc<ProviderRegistry>,
}

impl UnderstandStage {
    pub fn new(engine: Arc<IntentEngine>, providers: Arc<ProviderRegistry>) -> Self {
        Self { engine, providers }
    }

    /// The override when it names a known provider, else the default.
    /// An unknown override means no provider at all, so extraction goes to
    /// the fallback instead of silently asking someone else.
    fn select(&self, ctx: &PipelineContext) -> Option<Arc<dyn UnderstandingProvider>> {
        match ctx.provider_override.as_deref() {
            Some(name) => {
                let provider = self.providers.get(name);
                if provider.is_none() {
                    warn!(
                        provider = name,
                        known = ?self.providers.names(),
                        "unknown provider override, using keyword fallback"
                    );
                }
                provider
            }
            None => self.providers.default_provider(),
        }
    }
}

#[async_trait]
impl Stage for UnderstandStage {
    fn id(&self) -> StageId {
        StageId::Understand
    }

    fn deterministic(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let provider = self.select(ctx);
        let extraction = self
            .engine
            .extract(
                &ctx.request_text,
                ctx.prior_parameters.as_ref(),
                provider.as_deref(),
            )
            .await;

        Ok(StageOutput::Understood {
            parameters: extraction.parameters,
            report: extraction.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::{ExtractionOrigin, PipelineConfig};
    use midigent_intent::ScriptedProvider;

    fn stage(providers: ProviderRegistry) -> UnderstandStage {
        UnderstandStage::new(
            Arc::new(IntentEngine::builtin().unwrap()),
            Arc::new(providers),
        )
    }

    #[tokio::test]
    async fn test_no_provider_uses_fallback() {
        let ctx = PipelineContext::new("120 BPM lofi beat", &PipelineConfig::default());
        let output = stage(ProviderRegistry::new()).run(&ctx).await.unwrap();
        match output {
            StageOutput::Understood { parameters, report } => {
                assert_eq!(parameters.genre.primary, "lofi");
                assert_eq!(parameters.tempo.bpm, 120);
                assert_eq!(report.origin, ExtractionOrigin::Fallback);
                assert_eq!(report.attempts, 0);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_override_skips_default_provider() {
        let scripted = Arc::new(ScriptedProvider::new("scripted"));
        let providers = ProviderRegistry::new().with(scripted.clone());
        let config = PipelineConfig::default().with_provider("nobody");
        let ctx = PipelineContext::new("dark techno", &config);

        let output = stage(providers).run(&ctx).await.unwrap();
        assert!(matches!(
            output,
            StageOutput::Understood { ref report, .. } if report.origin == ExtractionOrigin::Fallback
        ));
        assert!(scripted.requests().is_empty());
    }

    #[tokio::test]
    async fn test_default_provider_is_asked() {
        let scripted = Arc::new(ScriptedProvider::new("scripted").fail("down").fail("down"));
        let providers = ProviderRegistry::new().with(scripted.clone());
        let ctx = PipelineContext::new("ambient drone", &PipelineConfig::default());

        stage(providers).run(&ctx).await.unwrap();
        assert!(!scripted.requests().is_empty());
    }
}
