//! HTTP trigger endpoint
//!
//! `POST /api/refresh` starts a run in the background and acknowledges at
//! once; the outcome is recorded on the run, not returned to the caller.
//!
//! - `POST /api/refresh` - 202 when a run was started, 409 while one is in flight
//! - `GET /api/metrics` - current [`crate::core::metrics::MetricsSnapshot`]
//! - `GET /health` - liveness

use crate::core::run::RunOrchestrator;
use crate::domain::MarketflowError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RunOrchestrator>,
}

/// Create the trigger router
pub fn router(orchestrator: Arc<RunOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/refresh", post(refresh))
        .route("/api/metrics", get(metrics))
        .with_state(AppState { orchestrator })
}

/// Binds `addr` and serves the router until `shutdown` resolves
///
/// A run in flight when the server stops keeps going in its task until the
/// runtime shuts down.
pub async fn serve(
    orchestrator: Arc<RunOrchestrator>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Trigger endpoint listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Trigger endpoint shut down gracefully");
    Ok(())
}

/// Health check handler
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Trigger handler
///
/// POST /api/refresh
async fn refresh(State(state): State<AppState>) -> Response {
    let permit = match state.orchestrator.try_reserve() {
        Ok(permit) => permit,
        Err(e) => {
            tracing::info!(error = %e, "Refresh rejected");
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "status": "busy",
                    "message": "A run is already in progress"
                })),
            )
                .into_response();
        }
    };

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.execute_reserved(permit).await {
            Ok(run) => {
                tracing::info!(
                    run_id = %run.run_id,
                    status = %run.status,
                    "Triggered run finished"
                );
            }
            Err(MarketflowError::RunInProgress(message)) => {
                tracing::warn!(message = %message, "Triggered run skipped");
            }
            Err(e) => {
                tracing::error!(error = %e, "Triggered run could not start");
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "message": "Run started"
        })),
    )
        .into_response()
}

/// Metrics snapshot handler
///
/// GET /api/metrics
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.orchestrator.metrics().snapshot()))
}
