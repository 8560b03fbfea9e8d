//! Core library for auditscope.  This module wires together the analysis
//! pipeline, the response envelope and the HTTP handlers.  Each request is
//! independent: the only state shared between requests is the inference
//! client and a set of monotonic metrics counters.

pub mod analysis;
mod config;
pub mod digest;
pub mod fallback;
pub mod inference;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod sanitize;
pub mod util;

pub use config::{AppConfig, InferenceSettings};

use axum::body::Bytes;
use axum::extract::{
    rejection::{BytesRejection, FailedToBufferBody},
    DefaultBodyLimit, State,
};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::analysis::AnalysisResult;
use crate::inference::{BedrockClient, InferenceClient};
use crate::pipeline::{Analysis, AnalysisSource};
use crate::request::{parse_inbound, Inbound, RequestError};

/// Successful analysis envelope.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: AnalysisResult,
    pub processed_entries: usize,
    pub timestamp: String,
    pub request_id: String,
}

/// Monotonic counters exposed on `/metrics`.
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub client_errors_total: AtomicU64,
    pub model_results_total: AtomicU64,
    pub degraded_results_total: AtomicU64,
    pub fallback_results_total: AtomicU64,
    // Inference latency histogram: bucket upper bounds (ms) and counts
    pub hist_buckets: Vec<u64>,
    pub hist_counts: Vec<AtomicU64>,
    pub hist_sum_ms: AtomicU64,
    pub hist_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        let buckets: Vec<u64> = vec![100, 250, 500, 1000, 2500, 5000, 10_000, 30_000, 60_000];
        Self {
            requests_total: AtomicU64::new(0),
            client_errors_total: AtomicU64::new(0),
            model_results_total: AtomicU64::new(0),
            degraded_results_total: AtomicU64::new(0),
            fallback_results_total: AtomicU64::new(0),
            hist_counts: buckets.iter().map(|_| AtomicU64::new(0)).collect(),
            hist_buckets: buckets,
            hist_sum_ms: AtomicU64::new(0),
            hist_count: AtomicU64::new(0),
        }
    }

    fn observe(&self, analysis: &Analysis) {
        let counter = match analysis.source {
            AnalysisSource::Model => &self.model_results_total,
            AnalysisSource::Degraded => &self.degraded_results_total,
            AnalysisSource::Fallback => &self.fallback_results_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let ms = analysis.inference_ms;
        self.hist_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.hist_count.fetch_add(1, Ordering::Relaxed);
        // find first bucket >= value
        for (idx, ub) in self.hist_buckets.iter().enumerate() {
            if ms <= *ub {
                self.hist_counts[idx].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<dyn InferenceClient>,
    /// Maximum accepted raw request body size in bytes (None => axum default)
    pub max_request_bytes: Option<usize>,
    /// Inference calls slower than this are logged at warn
    pub inference_warn_ms: u64,
    pub metrics: Arc<Metrics>,
    pub process_start_epoch: f64,
    pub process_start_instant: Instant,
}

impl AppState {
    /// State around an arbitrary inference client.  Used by the binary via
    /// [`build_state`] and directly by tests with a stub client.
    pub fn with_client(inference: Arc<dyn InferenceClient>, config: &AppConfig) -> Self {
        let start_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            inference,
            max_request_bytes: config.max_request_bytes,
            inference_warn_ms: config.inference_warn_ms,
            metrics: Arc::new(Metrics::new()),
            process_start_epoch: start_time.as_secs_f64(),
            process_start_instant: Instant::now(),
        }
    }
}

/// Build state with a Bedrock client for the given configuration.
pub fn build_state(config: &AppConfig) -> Result<AppState, inference::InferenceError> {
    let client = BedrockClient::new(&config.inference)?;
    tracing::info!(
        model_id = %config.inference.model_id,
        url = %client.invoke_url(),
        "inference client ready"
    );
    Ok(AppState::with_client(Arc::new(client), config))
}

/// Build state from environment variables.  See [`AppConfig::from_env`] for
/// the variables read.
pub async fn build_state_from_env() -> Result<AppState, Box<dyn std::error::Error>> {
    let config = AppConfig::from_env().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
    Ok(build_state(&config)?)
}

/// Build the Axum router and attach handlers.  Every response, including
/// errors produced by axum itself and recovered panics, carries the
/// cross-origin headers.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        .route(
            "/",
            post(analyze_handler)
                .get(analyze_handler)
                .options(preflight_handler),
        )
        .route(
            "/analyze",
            post(analyze_handler)
                .get(analyze_handler)
                .options(preflight_handler),
        )
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler));

    let router = if let Some(limit) = max_request_bytes {
        router.layer(DefaultBodyLimit::max(limit))
    } else {
        router
    };

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors_header(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            "*",
        ))
        .layer(cors_header(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            "POST, GET, OPTIONS",
        ))
        .layer(cors_header(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type, Authorization",
        ))
        .with_state(state)
}

fn cors_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

fn respond_with_error(err: RequestError) -> Response {
    (err.status(), Json(err.to_response_body())).into_response()
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "request handler panicked".to_string()
    };
    tracing::error!(error = %detail, "Unexpected error");
    respond_with_error(RequestError::Internal(detail))
}

fn request_id(headers: &HeaderMap) -> String {
    ["x-request-id", "x-amzn-requestid"]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Cross-origin pre-flight.  Never inspects the body.
async fn preflight_handler() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "CORS preflight" })),
    )
        .into_response()
}

/// Handler for `/` and `/analyze`.  Parses the event, runs the analysis
/// pipeline and wraps the result in the success envelope.  Model failures
/// never surface here; only request problems produce error statuses.
async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let raw = match body {
        Ok(raw) => raw,
        Err(rejection) => return handle_bytes_rejection(&state, rejection),
    };

    let batch = match parse_inbound(&raw) {
        Ok(Inbound::Preflight) => return preflight_handler().await,
        Ok(Inbound::Analyze(batch)) => batch,
        Err(err) => {
            state
                .metrics
                .client_errors_total
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, status = err.status().as_u16(), "rejecting request");
            return respond_with_error(err);
        }
    };

    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    let request_id = request_id(&headers);
    tracing::info!(entries = batch.len(), request_id = %request_id, "Processing audit log entries");

    let analysis =
        pipeline::analyze(state.inference.as_ref(), &batch, state.inference_warn_ms).await;
    state.metrics.observe(&analysis);
    tracing::info!(
        request_id = %request_id,
        source = analysis.source.as_str(),
        inference_ms = analysis.inference_ms,
        "analysis complete"
    );

    let envelope = AnalyzeResponse {
        success: true,
        analysis: analysis.result,
        processed_entries: batch.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        request_id,
    };
    match serde_json::to_value(&envelope) {
        Ok(json) => (StatusCode::OK, Json(json)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Unexpected error");
            respond_with_error(RequestError::Internal(err.to_string()))
        }
    }
}

fn handle_bytes_rejection(state: &AppState, rejection: BytesRejection) -> Response {
    match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            state
                .metrics
                .client_errors_total
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(limit = ?state.max_request_bytes, "request body exceeded configured limit");
            let message = match state.max_request_bytes {
                Some(limit) => format!("Request too large (body exceeded limit {} bytes)", limit),
                None => "Request too large".to_string(),
            };
            let body = request::ErrorResponse {
                error: "Request too large".to_string(),
                message,
            };
            (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
        }
        other => {
            tracing::error!(error = %other, "Unexpected error");
            respond_with_error(RequestError::Internal(other.body_text()))
        }
    }
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler(State(state): State<AppState>) -> Response {
    let json = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "modelId": state.inference.model_id(),
    });
    (StatusCode::OK, Json(json)).into_response()
}

/// Prometheus-style metrics exposition. Text format with simple counters.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    use std::fmt::Write as _;
    let m = &state.metrics;
    let mut buf = String::new();

    let counters = [
        (
            "auditscope_requests_total",
            "Analysis requests that passed validation",
            &m.requests_total,
        ),
        (
            "auditscope_client_errors_total",
            "Requests rejected as missing input, malformed or too large",
            &m.client_errors_total,
        ),
        (
            "auditscope_model_results_total",
            "Analyses decoded from the model answer",
            &m.model_results_total,
        ),
        (
            "auditscope_degraded_results_total",
            "Analyses degraded because the model answer did not decode",
            &m.degraded_results_total,
        ),
        (
            "auditscope_fallback_results_total",
            "Analyses produced by the deterministic fallback",
            &m.fallback_results_total,
        ),
    ];
    for (name, help, value) in counters {
        writeln!(&mut buf, "# HELP {} {}", name, help).ok();
        writeln!(&mut buf, "# TYPE {} counter", name).ok();
        writeln!(&mut buf, "{} {}", name, value.load(Ordering::Relaxed)).ok();
    }

    writeln!(
        &mut buf,
        "# HELP auditscope_inference_latency_ms Inference call latency histogram milliseconds"
    )
    .ok();
    writeln!(&mut buf, "# TYPE auditscope_inference_latency_ms histogram").ok();
    let mut cumulative: u64 = 0;
    for (i, ub) in m.hist_buckets.iter().enumerate() {
        cumulative += m.hist_counts[i].load(Ordering::Relaxed);
        writeln!(
            &mut buf,
            "auditscope_inference_latency_ms_bucket{{le=\"{}\"}} {}",
            ub, cumulative
        )
        .ok();
    }
    let count = m.hist_count.load(Ordering::Relaxed);
    writeln!(
        &mut buf,
        "auditscope_inference_latency_ms_bucket{{le=\"+Inf\"}} {}",
        count
    )
    .ok();
    writeln!(
        &mut buf,
        "auditscope_inference_latency_ms_sum {}",
        m.hist_sum_ms.load(Ordering::Relaxed)
    )
    .ok();
    writeln!(&mut buf, "auditscope_inference_latency_ms_count {}", count).ok();

    writeln!(
        &mut buf,
        "# HELP auditscope_build_info Build information\n# TYPE auditscope_build_info gauge"
    )
    .ok();
    writeln!(
        &mut buf,
        "auditscope_build_info{{version=\"{}\",modelId=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION"),
        state.inference.model_id()
    )
    .ok();
    writeln!(
        &mut buf,
        "# HELP auditscope_process_start_time_seconds Process start time (Unix epoch seconds)\n# TYPE auditscope_process_start_time_seconds gauge"
    )
    .ok();
    writeln!(
        &mut buf,
        "auditscope_process_start_time_seconds {}",
        state.process_start_epoch
    )
    .ok();
    writeln!(
        &mut buf,
        "# HELP auditscope_process_uptime_seconds Process uptime seconds\n# TYPE auditscope_process_uptime_seconds gauge"
    )
    .ok();
    writeln!(
        &mut buf,
        "auditscope_process_uptime_seconds {}",
        state.process_start_instant.elapsed().as_secs_f64()
    )
    .ok();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buf,
    )
        .into_response()
}
