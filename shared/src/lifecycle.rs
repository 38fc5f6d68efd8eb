//! Crop lifecycle assessment
//!
//! Given a crop record, its profile and the current time, work out the status
//! the record should hold and which alerts are owed. The assessment is derived
//! entirely from recomputed state and the record's reminder flags, so running
//! it again after a partially failed pass yields the missing work again.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CropGrowthProfile, CropRecord, CropStatus, TaskCategory};
use crate::schedule::{expected_harvest_date, generate, occurrences_on};

/// Tunable day counts used by the lifecycle rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleParams {
    /// Days after planting at which a planted crop counts as growing
    pub early_growth_days: i64,
    /// Days before expected harvest at which the harvest reminder fires
    pub harvest_lookahead_days: i64,
    /// First day irrigation reminders are sent
    pub irrigation_start_day: i64,
    /// Cadence of irrigation reminders after the first one
    pub irrigation_every_days: i64,
    /// Also remind about pest control occurrences
    pub alert_pest_control: bool,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            early_growth_days: 3,
            harvest_lookahead_days: 7,
            irrigation_start_day: 7,
            irrigation_every_days: 3,
            alert_pest_control: false,
        }
    }
}

/// Something the lifecycle monitor owes the crop's audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleNotice {
    /// Crop left the planted state; one-time, gated by `growth_started_sent`
    GrowthStarted { from: CropStatus, to: CropStatus },
    /// Crop completed its growth period; one-time, gated by `harvested_sent`
    Harvested { harvest_date: NaiveDate },
    /// Harvest is inside the lookahead window; one-time, gated by `harvest_approaching_sent`
    HarvestApproaching { expected_harvest: NaiveDate },
    /// A maintenance occurrence falls on today
    MaintenanceDue {
        category: TaskCategory,
        day: i64,
        pesticides: Vec<String>,
    },
}

/// Result of assessing one crop at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleAssessment {
    pub days_grown: i64,
    /// Status the record should hold after this pass
    pub target_status: CropStatus,
    /// Harvest date to record when the crop becomes harvested in this pass
    pub harvest_date: Option<NaiveDate>,
    pub notices: Vec<LifecycleNotice>,
}

impl LifecycleAssessment {
    pub fn status_changed(&self, current: CropStatus) -> bool {
        self.target_status != current
    }
}

/// Assess a crop. Returns `None` when there is nothing left to do for it:
/// failed crops, and harvested crops whose harvest alert was delivered.
pub fn assess(
    crop: &CropRecord,
    profile: &CropGrowthProfile,
    now: DateTime<Utc>,
    params: &LifecycleParams,
) -> Option<LifecycleAssessment> {
    match crop.status {
        CropStatus::Failed => return None,
        CropStatus::Harvested if crop.reminders.harvested_sent => return None,
        _ => {}
    }

    let days_grown = crop.days_grown(now);
    let growth_days = i64::from(profile.growth_days);
    let mut target_status = crop.status;
    let mut harvest_date = None;
    let mut notices = Vec::new();

    if target_status == CropStatus::Planted && days_grown >= params.early_growth_days {
        target_status = CropStatus::Growing;
    }
    if matches!(target_status, CropStatus::Planted | CropStatus::Growing)
        && days_grown >= growth_days
    {
        target_status = CropStatus::Harvested;
        harvest_date = Some(now.date_naive());
    }

    if target_status != CropStatus::Planted && !crop.reminders.growth_started_sent {
        // A crop that was already past planted before this pass still reports
        // the step it took out of planted
        notices.push(LifecycleNotice::GrowthStarted {
            from: CropStatus::Planted,
            to: CropStatus::Growing,
        });
    }

    if target_status == CropStatus::Harvested {
        if !crop.reminders.harvested_sent {
            notices.push(LifecycleNotice::Harvested {
                harvest_date: crop
                    .harvest_date
                    .or(harvest_date)
                    .unwrap_or_else(|| now.date_naive()),
            });
        }
        return Some(LifecycleAssessment {
            days_grown,
            target_status,
            harvest_date,
            notices,
        });
    }

    if days_grown >= 0 {
        notices.extend(maintenance_due(crop, profile, days_grown, params));
    }

    if !crop.reminders.harvest_approaching_sent
        && days_grown >= growth_days - params.harvest_lookahead_days
        && days_grown < growth_days
    {
        notices.push(LifecycleNotice::HarvestApproaching {
            expected_harvest: expected_harvest_date(crop.planting_date, profile),
        });
    }

    Some(LifecycleAssessment {
        days_grown,
        target_status,
        harvest_date,
        notices,
    })
}

fn maintenance_due(
    crop: &CropRecord,
    profile: &CropGrowthProfile,
    days_grown: i64,
    params: &LifecycleParams,
) -> Vec<LifecycleNotice> {
    let schedule = generate(crop.planting_date, profile);
    let mut due = Vec::new();

    if irrigation_due(profile, days_grown, params) {
        due.push(LifecycleNotice::MaintenanceDue {
            category: TaskCategory::Irrigation,
            day: days_grown,
            pesticides: Vec::new(),
        });
    }

    for occurrence in occurrences_on(&schedule, days_grown) {
        let alerted = match occurrence.category {
            TaskCategory::Weeding | TaskCategory::Fertilizer => true,
            TaskCategory::PestControl => params.alert_pest_control,
            TaskCategory::Irrigation => false,
        };
        if !alerted {
            continue;
        }
        let notice = LifecycleNotice::MaintenanceDue {
            category: occurrence.category,
            day: days_grown,
            pesticides: occurrence.pesticides.clone().unwrap_or_default(),
        };
        // Duplicate fertilizer offsets in a profile still mean one reminder
        if !due.contains(&notice) {
            due.push(notice);
        }
    }

    due
}

/// Irrigation reminders follow a fixed cadence instead of the profile frequency
fn irrigation_due(profile: &CropGrowthProfile, days_grown: i64, params: &LifecycleParams) -> bool {
    if profile.watering_frequency_days <= 0 || days_grown >= i64::from(profile.growth_days) {
        return false;
    }
    if days_grown < params.irrigation_start_day {
        return false;
    }
    params.irrigation_every_days > 0
        && (days_grown - params.irrigation_start_day) % params.irrigation_every_days == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GrowthProfileRegistry;
    use chrono::TimeZone;

    fn maize() -> CropGrowthProfile {
        GrowthProfileRegistry::builtin()
            .lookup("Maize")
            .unwrap()
            .clone()
    }

    fn crop_planted_on(date: NaiveDate) -> CropRecord {
        CropRecord::planted("North field maize", "Maize", date)
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + chrono::Duration::days(n)
    }

    fn planted() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_planted_stays_planted_before_threshold() {
        let crop = crop_planted_on(planted());
        let a = assess(&crop, &maize(), day(2), &LifecycleParams::default()).unwrap();
        assert_eq!(a.target_status, CropStatus::Planted);
        assert!(a.notices.is_empty());
    }

    #[test]
    fn test_planted_becomes_growing_on_day_three() {
        let crop = crop_planted_on(planted());
        let a = assess(&crop, &maize(), day(3), &LifecycleParams::default()).unwrap();
        assert_eq!(a.target_status, CropStatus::Growing);
        assert!(a.status_changed(CropStatus::Planted));
        assert_eq!(
            a.notices,
            vec![LifecycleNotice::GrowthStarted {
                from: CropStatus::Planted,
                to: CropStatus::Growing
            }]
        );
    }

    #[test]
    fn test_growth_notice_not_repeated_once_flagged() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let a = assess(&crop, &maize(), day(4), &LifecycleParams::default()).unwrap();
        assert_eq!(a.target_status, CropStatus::Growing);
        assert!(a.notices.is_empty());
    }

    #[test]
    fn test_harvest_at_end_of_growth_period() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let a = assess(&crop, &maize(), day(90), &LifecycleParams::default()).unwrap();
        assert_eq!(a.target_status, CropStatus::Harvested);
        assert_eq!(a.harvest_date, Some(day(90).date_naive()));
        assert_eq!(
            a.notices,
            vec![LifecycleNotice::Harvested {
                harvest_date: day(90).date_naive()
            }]
        );
    }

    #[test]
    fn test_harvested_with_alert_sent_is_done() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Harvested;
        crop.reminders.harvested_sent = true;
        assert!(assess(&crop, &maize(), day(95), &LifecycleParams::default()).is_none());

        crop.status = CropStatus::Failed;
        assert!(assess(&crop, &maize(), day(10), &LifecycleParams::default()).is_none());
    }

    #[test]
    fn test_harvested_without_alert_retries_the_alert() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Harvested;
        crop.harvest_date = Some(day(90).date_naive());
        crop.reminders.growth_started_sent = true;
        let a = assess(&crop, &maize(), day(91), &LifecycleParams::default()).unwrap();
        assert!(!a.status_changed(CropStatus::Harvested));
        assert_eq!(a.harvest_date, None);
        assert_eq!(
            a.notices,
            vec![LifecycleNotice::Harvested {
                harvest_date: day(90).date_naive()
            }]
        );
    }

    #[test]
    fn test_irrigation_cadence() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let params = LifecycleParams::default();

        let irrigation_days: Vec<i64> = (0..90)
            .filter(|d| {
                assess(&crop, &maize(), day(*d), &params)
                    .unwrap()
                    .notices
                    .iter()
                    .any(|n| {
                        matches!(
                            n,
                            LifecycleNotice::MaintenanceDue {
                                category: TaskCategory::Irrigation,
                                ..
                            }
                        )
                    })
            })
            .collect();

        assert_eq!(irrigation_days[..4], [7, 10, 13, 16]);
        assert!(irrigation_days.iter().all(|d| (d - 7) % 3 == 0));
    }

    #[test]
    fn test_weeding_and_fertilizer_on_profile_offsets() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let a = assess(&crop, &maize(), day(21), &LifecycleParams::default()).unwrap();
        let categories: Vec<TaskCategory> = a
            .notices
            .iter()
            .filter_map(|n| match n {
                LifecycleNotice::MaintenanceDue { category, .. } => Some(*category),
                _ => None,
            })
            .collect();
        assert!(categories.contains(&TaskCategory::Weeding));
        assert!(categories.contains(&TaskCategory::Fertilizer));
        assert!(!categories.contains(&TaskCategory::PestControl));
    }

    #[test]
    fn test_pest_control_alert_is_opt_in() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let params = LifecycleParams {
            alert_pest_control: true,
            ..LifecycleParams::default()
        };
        let a = assess(&crop, &maize(), day(14), &params).unwrap();
        let pest = a.notices.iter().find_map(|n| match n {
            LifecycleNotice::MaintenanceDue {
                category: TaskCategory::PestControl,
                pesticides,
                ..
            } => Some(pesticides.clone()),
            _ => None,
        });
        assert_eq!(pest, Some(maize().pesticides));
    }

    #[test]
    fn test_harvest_approaching_window() {
        let mut crop = crop_planted_on(planted());
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        let params = LifecycleParams::default();
        let approaching = |d: i64, crop: &CropRecord| {
            assess(crop, &maize(), day(d), &params)
                .unwrap()
                .notices
                .iter()
                .any(|n| matches!(n, LifecycleNotice::HarvestApproaching { .. }))
        };

        assert!(!approaching(82, &crop));
        assert!(approaching(83, &crop));
        assert!(approaching(89, &crop));

        crop.reminders.harvest_approaching_sent = true;
        assert!(!approaching(85, &crop));
    }

    #[test]
    fn test_future_planting_does_nothing() {
        let crop = crop_planted_on(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let a = assess(&crop, &maize(), day(0), &LifecycleParams::default()).unwrap();
        assert_eq!(a.target_status, CropStatus::Planted);
        assert!(a.days_grown < 0);
        assert!(a.notices.is_empty());
    }
}
