//! Monitoring engine control

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::EngineStatus;
use crate::AppState;

/// Engine activity plus the schedule it runs on
#[derive(Debug, Serialize)]
pub struct MonitoringStatusResponse {
    #[serde(flatten)]
    pub status: EngineStatus,
    pub interval_secs: u64,
    pub cashflow_every_ticks: u64,
}

fn status_response(state: &AppState) -> MonitoringStatusResponse {
    let monitoring = &state.config.monitoring;
    MonitoringStatusResponse {
        status: state.engine.status(),
        interval_secs: monitoring.interval().as_secs(),
        cashflow_every_ticks: monitoring.cashflow_every_ticks.max(1),
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<MonitoringStatusResponse> {
    Json(status_response(&state))
}

/// Stop and start the engine; the new session starts with an empty dedup history
pub async fn restart(State(state): State<AppState>) -> AppResult<Json<MonitoringStatusResponse>> {
    tracing::info!("Monitoring restart requested");
    state.engine.restart().await?;
    Ok(Json(status_response(&state)))
}
