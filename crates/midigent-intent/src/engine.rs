//! Intent extraction engine.
//!
//! preprocess → provider (primary, then one correction) → keyword fallback
//! → hard-number override → registry enrichment → seal.
//!
//! No path through `extract` fails: every failure degrades to a lower
//! confidence result and is recorded in the report.

use midigent_core::{Action, ExtractionOrigin, ExtractionReport, ParameterSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::draft::IntentDraft;
use crate::fallback::{keyword_draft, mentions_style, FALLBACK_CONFIDENCE};
use crate::preprocessor::{preprocess, Preprocessed};
use crate::prompts::{PromptBuilder, PromptError};
use crate::provider::{CompletionRequest, ProviderError, UnderstandingProvider};
use crate::registry::{GenreRegistry, RegistryError};
use crate::schema::validate;

pub const TEMPERATURE: f32 = 0.1;
pub const MAX_TOKENS: u32 = 1500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ENGINE/REGISTRY: {0}")]
    Registry(#[from] RegistryError),
    #[error("ENGINE/PROMPT: {0}")]
    Prompt(#[from] PromptError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Primary,
    Correction,
}

impl Attempt {
    fn label(self) -> &'static str {
        match self {
            Attempt::Primary => "primary",
            Attempt::Correction => "correction",
        }
    }
}

const ATTEMPTS: [Attempt; 2] = [Attempt::Primary, Attempt::Correction];

/// A sealed parameter set and how it was reached
#[derive(Debug, Clone)]
pub struct Extraction {
    pub parameters: ParameterSet,
    pub report: ExtractionReport,
}

pub struct IntentEngine {
    registry: Arc<GenreRegistry>,
    prompts: PromptBuilder,
    timeout: Duration,
}

impl IntentEngine {
    pub fn new(registry: Arc<GenreRegistry>, prompts: PromptBuilder) -> Self {
        Self {
            registry,
            prompts,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Embedded genre registry and prompt templates
    pub fn builtin() -> Result<Self, EngineError> {
        Ok(Self::new(
            Arc::new(GenreRegistry::builtin()?),
            PromptBuilder::builtin()?,
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &GenreRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<GenreRegistry> {
        Arc::clone(&self.registry)
    }

    /// Turn request text into a complete ParameterSet.
    ///
    /// `prior` is the previous composition in the session, if any.
    /// `provider` is `None` when no provider is configured or the requested
    /// one is unknown; extraction then goes straight to the fallback.
    pub async fn extract(
        &self,
        text: &str,
        prior: Option<&ParameterSet>,
        provider: Option<&dyn UnderstandingProvider>,
    ) -> Extraction {
        let pre = preprocess(text);
        let mut report = ExtractionReport {
            origin: ExtractionOrigin::Fallback,
            attempts: 0,
            failures: Vec::new(),
            corrections: Vec::new(),
            numbers: pre.numbers.clone(),
            normalized_text: pre.normalized.clone(),
        };

        let answered = match provider {
            Some(_) if pre.is_empty() => {
                report.failures.push("empty request, provider not called".to_string());
                None
            }
            Some(provider) => self.ask(provider, &pre, prior, &mut report).await,
            None => {
                report.failures.push("no understanding provider available".to_string());
                None
            }
        };

        let mut draft = match answered {
            Some(draft) => draft,
            None => {
                debug!(failures = report.failures.len(), "using keyword fallback");
                self.fallback_draft(&pre, prior)
            }
        };

        report.corrections.extend(draft.apply_numbers(&pre.numbers));
        report.corrections.extend(draft.enrich(&self.registry));
        let parameters = draft.seal(&self.registry);

        info!(
            origin = %report.origin,
            attempts = report.attempts,
            genre = %parameters.genre.primary,
            bpm = parameters.tempo.bpm,
            bars = parameters.duration.bars,
            confidence = parameters.overall_confidence,
            "intent extracted"
        );

        Extraction { parameters, report }
    }

    /// Primary call, then at most one correction call
    async fn ask(
        &self,
        provider: &dyn UnderstandingProvider,
        pre: &Preprocessed,
        prior: Option<&ParameterSet>,
        report: &mut ExtractionReport,
    ) -> Option<IntentDraft> {
        let system = match self.prompts.system_prompt(&self.registry, &pre.numbers, prior) {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "system prompt failed to render");
                report.failures.push(e.to_string());
                return None;
            }
        };
        let base = pre.enriched_prompt();
        let mut feedback: Option<String> = None;

        for attempt in ATTEMPTS {
            let user = match (attempt, &feedback) {
                (Attempt::Correction, Some(reason)) => match self.prompts.correction(reason) {
                    Ok(correction) => format!("{}\n\n{}", base, correction),
                    Err(e) => {
                        report.failures.push(e.to_string());
                        return None;
                    }
                },
                _ => base.clone(),
            };
            let request = CompletionRequest {
                system: system.clone(),
                user,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
                timeout: self.timeout,
            };

            report.attempts += 1;
            let raw = match tokio::time::timeout(self.timeout, provider.complete(&request)).await {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), attempt = attempt.label(), error = %e, "provider call failed");
                    report.failures.push(format!("{}: {}", attempt.label(), e));
                    return None;
                }
                Err(_) => {
                    let e = ProviderError::Timeout(self.timeout);
                    warn!(provider = provider.name(), attempt = attempt.label(), error = %e, "provider call timed out");
                    report.failures.push(format!("{}: {}", attempt.label(), e));
                    return None;
                }
            };

            match validate(&raw, &self.registry) {
                Ok(validated) => {
                    report.corrections.extend(validated.corrections);
                    report.origin = ExtractionOrigin::Provider {
                        name: provider.name().to_string(),
                    };
                    return Some(validated.draft);
                }
                Err(e) => {
                    warn!(provider = provider.name(), attempt = attempt.label(), error = %e, "provider output rejected");
                    report.failures.push(format!("{}: {}", attempt.label(), e));
                    feedback = Some(e.to_string());
                }
            }
        }
        None
    }

    fn fallback_draft(&self, pre: &Preprocessed, prior: Option<&ParameterSet>) -> IntentDraft {
        match prior {
            // A follow-up that names no style keeps the session's composition
            Some(prior) if !mentions_style(&pre.normalized) => {
                let mut draft = IntentDraft::from_prior(prior);
                draft.action = Action::Modify;
                draft.overall_confidence = FALLBACK_CONFIDENCE;
                draft.reasoning = "keyword fallback, kept the current composition".to_string();
                draft
            }
            _ => keyword_draft(&pre.normalized, &pre.numbers, &self.registry),
        }
    }
}
