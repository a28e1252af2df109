use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tts_core::{SynthesisRequest, SynthesisService, SynthesisStatus};

use crate::error::ApiError;
use crate::metrics::{AppMetrics, DetailedMetricsResponse};
use crate::validation::{validate_fingerprint, validate_tts_request};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SynthesisService>,
    pub metrics: AppMetrics,
    pub request_count: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(service: Arc<SynthesisService>) -> Self {
        Self {
            service,
            metrics: AppMetrics::new(),
            request_count: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TtsResponse {
    pub status: SynthesisStatus,
    pub audio_relative_path: String,
    pub elapsed_seconds: f64,
    pub text: String,
    pub fingerprint: String,
}

#[derive(Deserialize)]
pub struct CacheQuery {
    output_dir: String,
}

#[derive(Serialize)]
pub struct CacheEntryResponse {
    fingerprint: String,
    audio_path: String,
    text: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// All routes, mounted at the root and again under `/api`.
pub fn router(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/tts", post(tts_endpoint))
        .route("/cache/{fingerprint}", get(cache_lookup));

    // Metrics endpoint - consider adding authentication in production
    let metrics_api = Router::new().route("/metrics", get(metrics_endpoint));

    let api = Router::new().merge(public_api).merge(metrics_api);

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    // A hyphenated uuid is always a valid header value
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    Json(state.metrics.snapshot())
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let result = synthesize(&state, &req).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    state.metrics.tts.record_request(latency_ms);
    match &result {
        Ok(resp) => state
            .metrics
            .tts_specific
            .record_synthesis(latency_ms, resp.status == SynthesisStatus::Cached),
        Err(_) => {
            state.metrics.tts.record_error();
            state.metrics.tts_specific.record_failure();
        }
    }
    result.map(Json)
}

async fn synthesize(state: &AppState, req: &SynthesisRequest) -> Result<TtsResponse, ApiError> {
    validate_tts_request(&req.target_text)?;

    let outcome = state.service.synthesize(req).await?;
    info!(
        "TTS {:?} for {} in {:.2}s",
        outcome.status,
        outcome.entry.fingerprint,
        outcome.elapsed.as_secs_f64()
    );

    Ok(TtsResponse {
        status: outcome.status,
        audio_relative_path: outcome.audio_relative_path.to_string_lossy().into_owned(),
        elapsed_seconds: outcome.elapsed.as_secs_f64(),
        text: outcome.text,
        fingerprint: outcome.entry.fingerprint.to_string(),
    })
}

pub async fn cache_lookup(
    State(state): State<AppState>,
    Path(fingerprint): Path<String>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<CacheEntryResponse>, ApiError> {
    let fp = validate_fingerprint(&fingerprint)?;
    let entry = state
        .service
        .lookup(&query.output_dir, &fp)?
        .ok_or_else(|| ApiError::NotFound(format!("No cache entry for {fp}")))?;
    let text = entry.read_text()?;

    Ok(Json(CacheEntryResponse {
        fingerprint: entry.fingerprint.to_string(),
        audio_path: entry.audio_path.to_string_lossy().into_owned(),
        text,
        created_at: entry.created_at,
    }))
}
