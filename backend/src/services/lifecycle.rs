//! Crop lifecycle monitor
//!
//! Each pass re-reads every crop, lets [`shared::assess`] decide the status
//! the record should hold and which alerts are owed, then applies that in
//! three independently retryable steps: status write, alert delivery,
//! reminder flag write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use shared::{
    assess, AlertKind, AlertTarget, CropRecord, EntityRef, GrowthProfileRegistry,
    LifecycleNotice, LifecycleParams, NewAlert, ReminderFlags, TaskCategory,
};

use super::session::MonitorSession;
use crate::error::AppResult;
use crate::store::CropStore;

/// Outcome of one lifecycle pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub evaluated: usize,
    pub transitioned: usize,
    pub alerts_emitted: usize,
    pub failed: usize,
}

pub struct CropLifecycleMonitor {
    crops: Arc<dyn CropStore>,
    registry: Arc<GrowthProfileRegistry>,
    params: LifecycleParams,
}

impl CropLifecycleMonitor {
    pub fn new(
        crops: Arc<dyn CropStore>,
        registry: Arc<GrowthProfileRegistry>,
        params: LifecycleParams,
    ) -> Self {
        Self {
            crops,
            registry,
            params,
        }
    }

    /// Evaluate every crop once. Fails only when the crop list cannot be read;
    /// a failure on one crop is logged and counted.
    pub async fn run(&self, session: &MonitorSession, now: DateTime<Utc>) -> AppResult<LifecycleReport> {
        let crops = self.crops.list_crops().await?;
        let mut report = LifecycleReport::default();

        for crop in crops {
            match self.evaluate(session, &crop, now).await {
                Ok(Some(outcome)) => {
                    report.evaluated += 1;
                    report.transitioned += usize::from(outcome.transitioned);
                    report.alerts_emitted += outcome.alerts_emitted;
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(crop_id = %crop.id, crop = %crop.name, "Crop evaluation failed: {}", e);
                }
            }
        }

        tracing::debug!(?report, "Lifecycle pass complete");
        Ok(report)
    }

    async fn evaluate(
        &self,
        session: &MonitorSession,
        crop: &CropRecord,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CropOutcome>> {
        let Some(profile) = self.registry.lookup(&crop.profile_name) else {
            tracing::debug!(crop_id = %crop.id, profile = %crop.profile_name, "No growth profile; skipping");
            return Ok(None);
        };

        let Some(assessment) = assess(crop, profile, now, &self.params) else {
            return Ok(None);
        };

        let mut outcome = CropOutcome::default();

        // A failed status write leaves the crop for the next pass
        if assessment.status_changed(crop.status) {
            self.crops
                .update_status(crop.id, assessment.target_status, assessment.harvest_date)
                .await?;
            outcome.transitioned = true;
            tracing::info!(
                crop_id = %crop.id,
                from = %crop.status,
                to = %assessment.target_status,
                days_grown = assessment.days_grown,
                "Crop status advanced"
            );
        }

        let mut reminders = crop.reminders;
        for notice in &assessment.notices {
            let alert = NewAlert::new(
                alert_kind(crop, notice),
                AlertTarget::for_user(crop.owner_id),
                EntityRef::crop(crop.id),
            );
            match session.emit(alert).await {
                Ok(emitted) => {
                    outcome.alerts_emitted += usize::from(emitted.is_some());
                    mark_sent(&mut reminders, notice);
                }
                Err(e) => {
                    tracing::warn!(crop_id = %crop.id, "Alert delivery failed: {}", e);
                }
            }
        }

        if reminders != crop.reminders {
            self.crops.set_reminders(crop.id, reminders).await?;
        }

        Ok(Some(outcome))
    }
}

#[derive(Debug, Default)]
struct CropOutcome {
    transitioned: bool,
    alerts_emitted: usize,
}

fn alert_kind(crop: &CropRecord, notice: &LifecycleNotice) -> AlertKind {
    let crop_name = crop.name.clone();
    match notice {
        LifecycleNotice::GrowthStarted { from, to } => AlertKind::CropStatusUpdate {
            crop_name,
            from: *from,
            to: *to,
        },
        LifecycleNotice::Harvested { harvest_date } => AlertKind::CropHarvested {
            crop_name,
            harvest_date: *harvest_date,
        },
        LifecycleNotice::HarvestApproaching { expected_harvest } => {
            AlertKind::HarvestApproaching {
                crop_name,
                expected_harvest: *expected_harvest,
            }
        }
        LifecycleNotice::MaintenanceDue {
            category,
            day,
            pesticides,
        } => match category {
            TaskCategory::Irrigation => AlertKind::IrrigationDue { crop_name, day: *day },
            TaskCategory::Weeding => AlertKind::WeedingDue { crop_name, day: *day },
            TaskCategory::Fertilizer => AlertKind::FertilizerDue { crop_name, day: *day },
            TaskCategory::PestControl => AlertKind::PestControlDue {
                crop_name,
                day: *day,
                pesticides: pesticides.clone(),
            },
        },
    }
}

fn mark_sent(reminders: &mut ReminderFlags, notice: &LifecycleNotice) {
    match notice {
        LifecycleNotice::GrowthStarted { .. } => reminders.growth_started_sent = true,
        LifecycleNotice::Harvested { .. } => reminders.harvested_sent = true,
        LifecycleNotice::HarvestApproaching { .. } => reminders.harvest_approaching_sent = true,
        LifecycleNotice::MaintenanceDue { .. } => {}
    }
}
