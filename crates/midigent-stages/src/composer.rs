use midigent_compose::{
    ArtifactSerializer, HeuristicGenerator, MidiSerializer, RenderError, SummaryRenderer,
    TemplatesFile, TrackGenerator,
};
use midigent_core::{
    PipelineConfig, PipelineContext, Stage, StageGraph, StageId, StageSet, TelemetrySink,
};
use midigent_intent::{EngineError, GenreRegistry, IntentEngine, ProviderRegistry, UnderstandingProvider};
use midigent_quality::{QualityAssessor, QualityProfile};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    AssessQualityStage, FinalizeStage, GenerateStage, PlanStage, RefineStage, SummarizeStage,
    UnderstandStage, ValidateTheoryStage,
};

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("COMPOSER/ENGINE: {0}")]
    Engine(#[from] EngineError),
    #[error("COMPOSER/RENDER: {0}")]
    Render(#[from] RenderError),
}

/// Text in, composition out. Shared across requests; every call to
/// [`run`](Composer::run) gets its own context.
pub struct Composer {
    graph: StageGraph,
    registry: Arc<GenreRegistry>,
}

impl Composer {
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder::default()
    }

    /// Built-in engine, no provider (keyword fallback only), heuristic
    /// generator and in-memory MIDI.
    pub fn offline() -> Result<Self, ComposerError> {
        Self::builder().build()
    }

    /// Runs one request to a terminal state. `prior` continues a session:
    /// its parameters become the base for modifications.
    pub async fn run(
        &self,
        request_text: &str,
        prior: Option<&PipelineContext>,
        config: &PipelineConfig,
    ) -> PipelineContext {
        let ctx = PipelineContext::following(request_text, prior, config);
        self.graph.run(ctx).await
    }

    pub fn registry(&self) -> &GenreRegistry {
        &self.registry
    }
}

pub struct ComposerBuilder {
    engine: Option<IntentEngine>,
    providers: ProviderRegistry,
    generator: Arc<dyn TrackGenerator>,
    serializer: Arc<dyn ArtifactSerializer>,
    profile: QualityProfile,
    templates: Option<TemplatesFile>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    overrides: Vec<Box<dyn Stage>>,
}

impl Default for ComposerBuilder {
    fn default() -> Self {
        Self {
            engine: None,
            providers: ProviderRegistry::new(),
            generator: Arc::new(HeuristicGenerator),
            serializer: Arc::new(MidiSerializer::in_memory()),
            profile: QualityProfile::default(),
            templates: None,
            telemetry: None,
            overrides: Vec::new(),
        }
    }
}

impl ComposerBuilder {
    pub fn engine(mut self, engine: IntentEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Registers one more provider; the first registered is the default
    pub fn provider(mut self, provider: Arc<dyn UnderstandingProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TrackGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn ArtifactSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn quality_profile(mut self, profile: QualityProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn templates(mut self, templates: TemplatesFile) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Replaces the default stage in the slot named by `stage.id()`
    pub fn stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.overrides.push(stage);
        self
    }

    pub fn build(self) -> Result<Composer, ComposerError> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => IntentEngine::builtin()?,
        };
        let registry = engine.shared_registry();
        let renderer = match self.templates {
            Some(templates) => SummaryRenderer::new(templates)?,
            None => SummaryRenderer::builtin()?,
        };

        let mut stages = StageSet {
            understand: Box::new(UnderstandStage::new(
                Arc::new(engine),
                Arc::new(self.providers),
            )),
            plan: Box::new(PlanStage::new(Arc::clone(&registry))),
            validate_theory: Box::new(ValidateTheoryStage::new(Arc::clone(&registry))),
            generate: Box::new(GenerateStage::new(Arc::clone(&self.generator))),
            assess_quality: Box::new(AssessQualityStage::new(
                QualityAssessor::new(self.profile),
                Arc::clone(&registry),
            )),
            refine: Box::new(RefineStage::new(self.generator)),
            finalize: Box::new(FinalizeStage::new(self.serializer)),
            summarize: Box::new(SummarizeStage::new(renderer)),
        };
        for stage in self.overrides {
            replace(&mut stages, stage);
        }

        let mut graph = StageGraph::new(stages);
        if let Some(sink) = self.telemetry {
            graph = graph.with_telemetry(sink);
        }
        Ok(Composer { graph, registry })
    }
}

fn replace(stages: &mut StageSet, stage: Box<dyn Stage>) {
    let slot = match stage.id() {
        StageId::Understand => &mut stages.understand,
        StageId::Plan => &mut stages.plan,
        StageId::ValidateTheory => &mut stages.validate_theory,
        StageId::Generate => &mut stages.generate,
        StageId::AssessQuality => &mut stages.assess_quality,
        StageId::Refine => &mut stages.refine,
        StageId::Finalize => &mut stages.finalize,
        StageId::Summarize => &mut stages.summarize,
    };
    *slot = stage;
}
