//! Health check endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use std::time::SystemTime;
use tracing::instrument;

use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

/// Returns service health information.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let status = if state.is_draining() {
        HealthStatus::Draining
    } else {
        HealthStatus::Healthy
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        started_at: DateTime::<Utc>::from(state.start_time),
        include_stack: state.include_stack,
    })
}
