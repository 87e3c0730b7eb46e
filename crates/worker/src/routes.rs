//! Intake routes: job submission and health.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use wanvid_core::job::{JobRequest, JobResponse};

use crate::error::AppResult;
use crate::handler;
use crate::state::AppState;

/// Platform job envelope: the request proper sits under `input`.
#[derive(Debug, Deserialize)]
pub struct JobEnvelope {
    pub input: JobRequest,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the engine answered a single probe.
    pub engine_reachable: bool,
}

/// POST /run -- process one job synchronously.
async fn run_job(
    State(state): State<AppState>,
    Json(envelope): Json<JobEnvelope>,
) -> AppResult<Json<JobResponse>> {
    let response = handler::handle(&state, envelope.input).await?;
    Ok(Json(response))
}

/// GET /health -- service and engine reachability.
///
/// A single probe, not the bounded retry loop: health must answer
/// promptly even while the engine is still coming up.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_reachable = state.api.health().await.is_ok();

    let status = if engine_reachable { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        engine_reachable,
    })
}

/// Mount all intake routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_job))
        .route("/health", get(health_check))
}
