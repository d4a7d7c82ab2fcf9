//! midigent intent: free-text request → ParameterSet.
//!
//! The [`IntentEngine`] runs preprocessing, at most two provider calls with
//! schema validation, a deterministic keyword fallback, hard-number
//! overrides and registry enrichment. It always returns a complete set.

pub mod draft;
pub mod engine;
pub mod fallback;
pub mod normalizer;
pub mod numbers;
pub mod preprocessor;
pub mod prompts;
pub mod provider;
pub mod registry;
pub mod schema;

pub use draft::IntentDraft;
pub use engine::{EngineError, Extraction, IntentEngine, DEFAULT_TIMEOUT, MAX_TOKENS, TEMPERATURE};
pub use fallback::keyword_draft;
pub use numbers::extract_numbers;
pub use preprocessor::{preprocess, Preprocessed};
pub use prompts::{PromptBuilder, PromptError};
pub use provider::{
    CompletionRequest, OpenAiCompatibleProvider, ProviderConfig, ProviderError, ProviderRegistry,
    ScriptedProvider, UnderstandingProvider,
};
pub use registry::{registry, resolve_scale, GenreProfile, GenreRegistry, RegistryError};
pub use schema::{validate, ValidationError};
