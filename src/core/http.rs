//! Monitoring surface served with Axum

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::core::cycle::PairPhase;
use crate::core::scheduler::PairScheduler;
use crate::health::{Heartbeat, HealthMonitor};
use crate::metrics::Metrics;
use crate::models::{HealthStatus, PairHealthState};

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<HealthMonitor>,
    pub heartbeat: Arc<Heartbeat>,
    pub scheduler: Option<Arc<PairScheduler>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(health: Arc<HealthMonitor>, metrics: Arc<Metrics>) -> Self {
        Self {
            health,
            heartbeat: Arc::new(Heartbeat::new()),
            scheduler: None,
            metrics,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<PairScheduler>) -> Self {
        self.heartbeat = scheduler.heartbeat();
        self.scheduler = Some(scheduler);
        self
    }
}

#[derive(Debug, Serialize)]
struct PairHealthResponse {
    pair_id: String,
    status: HealthStatus,
    consecutive_failures: u32,
    last_success_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_retry_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<PairPhase>,
    delivery_failures: u64,
}

impl PairHealthResponse {
    fn build(state: &AppState, pair: PairHealthState) -> Self {
        let phase = state
            .scheduler
            .as_ref()
            .and_then(|s| s.phase(&pair.pair_id));
        let delivery_failures = state.health.delivery_failures(&pair.pair_id);
        Self {
            pair_id: pair.pair_id,
            status: pair.status,
            consecutive_failures: pair.consecutive_failures,
            last_success_at: pair.last_success_at,
            next_retry_at: pair.next_retry_at,
            phase,
            delivery_failures,
        }
    }
}

/// Aggregate liveness. Always 200: low liveness is degraded service, not an outage.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let report = state.health.liveness(Utc::now());
    let status = if report.below_threshold {
        "degraded"
    } else {
        "healthy"
    };
    Json(json!({
        "status": status,
        "liveness": report.liveness,
        "pairs_total": report.pairs_total,
        "pairs_healthy": report.pairs_healthy,
        "pairs_degraded": report.pairs_degraded,
        "pairs_suspended": report.pairs_suspended,
        "scheduler_stalled": state.heartbeat.is_stalled(),
        "last_round_at": state.heartbeat.last_round(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "pairsignal-engine"
    }))
}

async fn list_pairs(State(state): State<AppState>) -> Json<Vec<PairHealthResponse>> {
    let pairs = state
        .health
        .pair_states()
        .into_iter()
        .map(|pair| PairHealthResponse::build(&state, pair))
        .collect();
    Json(pairs)
}

async fn get_pair(
    State(state): State<AppState>,
    Path(pair_id): Path<String>,
) -> Result<Json<PairHealthResponse>, StatusCode> {
    let pair = state
        .health
        .pair_state(&pair_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(PairHealthResponse::build(&state, pair)))
}

async fn list_feeds(State(state): State<AppState>) -> Json<Vec<PairHealthState>> {
    Json(state.health.feed_states())
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.export().map_err(|e| {
        error!(error = %e, "Failed to export metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/pairs", get(list_pairs))
        .route("/health/pairs/{pair_id}", get(get_pair))
        .route("/health/feeds", get(list_feeds))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the monitoring surface until `shutdown` flips to true.
pub async fn start_server(
    state: AppState,
    port: u16,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "Monitoring server listening on port {}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}
