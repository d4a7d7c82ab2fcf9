//! API Handlers
use axum::{
    extract::State,
    http::{header, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use midigent_core::{
    ArtifactHandle, ParameterSet, PipelineConfig, QualityReport, StageFailure, MIDIGENT_VERSION,
};
use midigent_stages::Composer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::Metrics;

/// Upper bound a caller may ask for through `max_iterations`
pub const MAX_ITERATIONS_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<Composer>,
    pub metrics: Arc<Metrics>,
    pub config: PipelineConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(composer: Composer, metrics: Metrics, config: PipelineConfig) -> Self {
        Self {
            composer: Arc::new(composer),
            metrics: Arc::new(metrics),
            config,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub text: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Provider name; unknown names fall back to keyword extraction
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComposeResponse {
    pub correlation_id: String,
    pub succeeded: bool,
    pub summary: Option<String>,
    pub parameters: Option<ParameterSet>,
    pub quality: Option<QualityReport>,
    pub artifact: Option<ArtifactHandle>,
    pub error: Option<StageFailure>,
    pub iterations: u32,
    pub refinements: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct GenreEntry {
    pub id: String,
    pub name: String,
    pub tempo_min: u16,
    pub tempo_max: u16,
    pub key: String,
    pub energy: String,
    pub tracks: u8,
}

/// POST /v1/compose
///
/// 200 with the composition, 500 with the same body when a stage failed,
/// 422 when the request itself is out of bounds.
pub async fn compose(
    State(state): State<AppState>,
    Json(payload): Json<ComposeRequest>,
) -> Result<(StatusCode, Json<ComposeResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut config = state.config.clone();
    if let Some(max) = payload.max_iterations {
        if max > MAX_ITERATIONS_LIMIT {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: format!(
                        "max_iterations {} exceeds the limit of {}",
                        max, MAX_ITERATIONS_LIMIT
                    ),
                }),
            ));
        }
        config = config.with_max_iterations(max);
    }
    if let Some(provider) = payload.provider {
        config = config.with_provider(provider);
    }

    let started = Instant::now();
    let ctx = state.composer.run(&payload.text, None, &config).await;
    state.metrics.observe(&ctx, started.elapsed());

    let succeeded = ctx.succeeded();
    let status = if succeeded {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let response = ComposeResponse {
        correlation_id: ctx.correlation_id,
        succeeded,
        summary: ctx.summary,
        parameters: ctx.parameters,
        quality: ctx.quality,
        artifact: ctx.artifact,
        error: ctx.error,
        iterations: ctx.current_iteration,
        refinements: ctx.refinement_notes,
    };
    Ok((status, Json(response)))
}

/// GET /v1/genres
pub async fn list_genres(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let genres: Vec<GenreEntry> = state
        .composer
        .registry()
        .iter()
        .map(|profile| GenreEntry {
            id: profile.id.clone(),
            name: profile.name.clone(),
            tempo_min: profile.tempo_min,
            tempo_max: profile.tempo_max,
            key: format!("{} {}", profile.key_root, profile.scale),
            energy: profile.energy.to_string(),
            tracks: profile.tracks,
        })
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "count": genres.len(), "genres": genres })),
    )
}

/// GET /v1/health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": MIDIGENT_VERSION,
            "uptime_seconds": uptime,
        })),
    )
}

/// GET /metrics
pub async fn metrics(
    State(state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}
