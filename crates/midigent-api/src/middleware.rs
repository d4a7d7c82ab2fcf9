//! Request-level layers shared by every route.
use axum::middleware::Next;
use axum::{body::Body, http::Request, response::Response};
use std::time::Instant;
use tower_http::cors::CorsLayer;

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

/// One log line per request with status and latency
pub async fn request_timing(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    response
}
