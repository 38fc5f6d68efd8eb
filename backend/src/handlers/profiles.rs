//! Growth profile and schedule handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use shared::{expected_harvest_date, generate, CropGrowthProfile, CropStatus, ScheduledTaskOccurrence};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// List every known growth profile
pub async fn list_profiles(State(state): State<AppState>) -> Json<Vec<CropGrowthProfile>> {
    Json(state.registry.profiles().to_vec())
}

/// Look up one profile by crop name (case-insensitive)
pub async fn get_profile(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<CropGrowthProfile>> {
    state
        .registry
        .lookup(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Growth profile '{}'", name)))
}

/// Maintenance calendar of a crop
#[derive(Debug, Serialize)]
pub struct CropScheduleResponse {
    pub crop_id: Uuid,
    pub crop_name: String,
    pub status: CropStatus,
    pub planting_date: NaiveDate,
    /// `None` when the crop's profile is unknown; no schedule is derivable then
    pub profile: Option<String>,
    pub expected_harvest_date: Option<NaiveDate>,
    pub occurrences: Vec<ScheduledTaskOccurrence>,
}

/// Derived maintenance schedule and expected harvest date of a crop
pub async fn get_crop_schedule(
    State(state): State<AppState>,
    Path(crop_id): Path<Uuid>,
) -> AppResult<Json<CropScheduleResponse>> {
    let crop = state
        .stores
        .crops
        .get_crop(crop_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Crop".to_string()))?;

    let profile = state.registry.lookup(&crop.profile_name);

    Ok(Json(CropScheduleResponse {
        crop_id: crop.id,
        crop_name: crop.name,
        status: crop.status,
        planting_date: crop.planting_date,
        profile: profile.map(|p| p.name.clone()),
        expected_harvest_date: profile.map(|p| expected_harvest_date(crop.planting_date, p)),
        occurrences: profile
            .map(|p| generate(crop.planting_date, p))
            .unwrap_or_default(),
    }))
}
