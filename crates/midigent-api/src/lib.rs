//! midigent API /v1: REST endpoints over the composer
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod settings;

use axum::{
    routing::{get, post},
    Router,
};
use midigent_compose::{MidiSerializer, RenderError, TemplatesFile};
use midigent_core::{JsonlSink, TracingSink};
use midigent_intent::{OpenAiCompatibleProvider, ProviderError};
use midigent_stages::{Composer, ComposerError};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;
pub use metrics::Metrics;
pub use settings::{Settings, SettingsError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API/SETTINGS: {0}")]
    Settings(#[from] SettingsError),
    #[error("API/COMPOSER: {0}")]
    Composer(#[from] ComposerError),
    #[error("API/TEMPLATES: {0}")]
    Templates(#[from] RenderError),
    #[error("API/PROVIDER: {0}")]
    Provider(#[from] ProviderError),
    #[error("API/METRICS: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("API/IO: {0}")]
    Io(#[from] std::io::Error),
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/compose", post(handlers::compose))
        .route("/v1/genres", get(handlers::list_genres))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::request_timing))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

/// Composer, metrics and defaults as described by `settings`
pub fn build_state(settings: &Settings) -> Result<AppState, ApiError> {
    let mut builder = Composer::builder().quality_profile(settings.quality.clone());

    builder = match &settings.output_dir {
        Some(dir) => builder.serializer(Arc::new(MidiSerializer::to_dir(dir.clone()))),
        None => builder.serializer(Arc::new(MidiSerializer::in_memory())),
    };
    builder = match &settings.telemetry_log {
        Some(path) => builder.telemetry(Arc::new(JsonlSink::new(path.clone()))),
        None => builder.telemetry(Arc::new(TracingSink)),
    };
    if let Some(path) = &settings.summary_templates {
        builder = builder.templates(TemplatesFile::load(path)?);
    }
    if let Some(config) = &settings.provider {
        tracing::info!(provider = %config.name, model = %config.model, "provider registered");
        builder = builder.provider(Arc::new(OpenAiCompatibleProvider::new(config.clone())?));
    }

    Ok(AppState::new(
        builder.build()?,
        Metrics::new()?,
        settings.pipeline_config(),
    ))
}

pub async fn run(settings: Settings) -> Result<(), ApiError> {
    let app = create_app(build_state(&settings)?);
    let listener = tokio::net::TcpListener::bind(&settings.addr).await?;

    tracing::info!("midigent API listening on {}", settings.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
