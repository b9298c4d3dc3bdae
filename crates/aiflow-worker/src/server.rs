//! Health, stats and metrics HTTP surface.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use aiflow_dispatch::{HealthMonitor, ProviderHealth, ServiceStats};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::consumer::ConsumerStatus;
use crate::error::WorkerResult;
use crate::pool::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<WorkerPool>,
    pub monitor: Arc<HealthMonitor>,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub instance_id: String,
    pub is_running: bool,
    pub active_jobs: usize,
    pub total_workers: usize,
    pub workers: Vec<ConsumerStatus>,
    pub providers: Vec<ProviderHealth>,
}

/// Worker pool and provider health.
///
/// 503 when the pool is not consuming; `degraded` when any provider probe
/// fails.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pool = state.pool.status().await;
    let providers = state.monitor.check_all().await;

    let status = if !pool.is_running {
        "stopped"
    } else if providers.iter().all(|p| p.healthy) {
        "healthy"
    } else {
        "degraded"
    };
    let code = if pool.is_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
            instance_id: pool.instance_id,
            is_running: pool.is_running,
            active_jobs: pool.active_jobs,
            total_workers: pool.total_workers,
            workers: pool.workers,
            providers,
        }),
    )
}

/// Per-provider stats, keyed by provider or model name.
pub async fn stats(State(state): State<AppState>) -> Json<BTreeMap<String, ServiceStats>> {
    Json(state.monitor.stats().snapshot().await.into_iter().collect())
}

#[derive(Debug, Deserialize)]
pub struct ResetParams {
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: String,
}

/// Clear stats for one provider (`?provider=`) or all of them.
pub async fn reset_stats(
    State(state): State<AppState>,
    Query(params): Query<ResetParams>,
) -> Json<ResetResponse> {
    state.monitor.stats().reset(params.provider.as_deref()).await;
    let reset = params.provider.unwrap_or_else(|| "all".to_string());
    info!(provider = %reset, "Stats reset");
    Json(ResetResponse { reset })
}

/// Create the health/metrics router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/stats/reset", post(reset_stats))
        .with_state(state)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(router: Router, addr: SocketAddr, shutdown: F) -> WorkerResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
