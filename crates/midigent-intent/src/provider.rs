//! Understanding providers.
//!
//! A provider turns a system prompt plus a user message into raw text,
//! which the engine then validates. The engine owns retries and the
//! fallback; providers make exactly one call per `complete`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("PROVIDER/TIMEOUT: no answer within {0:?}")]
    Timeout(Duration),
    #[error("PROVIDER/HTTP: {0}")]
    Http(String),
    #[error("PROVIDER/STATUS: {status}: {body}")]
    Status { status: u16, body: String },
    #[error("PROVIDER/RESPONSE: {0}")]
    Response(String),
    #[error("PROVIDER/CONFIG: {0}")]
    Config(String),
    #[error("PROVIDER/EXHAUSTED: {0} has no scripted responses left")]
    Exhausted(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Http(format!("timed out: {}", e))
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[async_trait]
pub trait UnderstandingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// e.g. "http://localhost:11434/v1"
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. Unset means no auth header.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            model: model.into(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }
}

// ============================================================================
// OPENAI-COMPATIBLE
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible base URL
pub struct OpenAiCompatibleProvider {
    config: ProviderConfig,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.base_url.trim().is_empty() {
            return Err(ProviderError::Config(format!("{}: empty base_url", config.name)));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        Ok(Self { config, api_key, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl UnderstandingProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(provider = %self.config.name, model = %self.config.model, "chat completion");
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ProviderError::Response("empty completion".to_string()))
    }
}

// ============================================================================
// SCRIPTED
// ============================================================================

/// Replays canned answers in order. Errors once the script runs out.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful answer
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a transport failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, entry: Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UnderstandingProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| ProviderError::Response("script lock poisoned".to_string()))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ProviderError::Http(message)),
            None => Err(ProviderError::Exhausted(self.name.clone())),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Named providers. The first registered one is the default.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn UnderstandingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. A provider with the same name is replaced in place.
    pub fn register(&mut self, provider: Arc<dyn UnderstandingProvider>) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn with(mut self, provider: Arc<dyn UnderstandingProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn UnderstandingProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn default_provider(&self) -> Option<Arc<dyn UnderstandingProvider>> {
        self.providers.first().cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
