//! Maintenance schedule generation
//!
//! Derives the dated maintenance calendar of a crop from its planting date and
//! growth profile. Output is fully ordered by (day offset, category) so two
//! schedules generated from the same inputs are identical.

use chrono::{Days, Duration, NaiveDate};

use crate::models::{CropGrowthProfile, ScheduledTaskOccurrence, TaskCategory};

/// Generate every maintenance occurrence between planting and harvest
pub fn generate(
    planting_date: NaiveDate,
    profile: &CropGrowthProfile,
) -> Vec<ScheduledTaskOccurrence> {
    let growth_days = profile.growth_days;
    if growth_days <= 0 {
        return Vec::new();
    }

    let mut offsets: Vec<(i32, TaskCategory)> = Vec::new();
    offsets.extend(
        recurring_offsets(profile.watering_frequency_days, growth_days)
            .into_iter()
            .map(|d| (d, TaskCategory::Irrigation)),
    );
    offsets.extend(
        recurring_offsets(profile.weeding_frequency_days, growth_days)
            .into_iter()
            .map(|d| (d, TaskCategory::Weeding)),
    );
    offsets.extend(
        profile
            .fertilizer_schedule_days
            .iter()
            .copied()
            .filter(|d| *d >= 0 && *d < growth_days)
            .map(|d| (d, TaskCategory::Fertilizer)),
    );
    offsets.extend(
        recurring_offsets(profile.pest_control_frequency_days, growth_days)
            .into_iter()
            .map(|d| (d, TaskCategory::PestControl)),
    );

    // Stable sort keeps duplicate fertilizer offsets in profile order
    offsets.sort_by_key(|(day, category)| (*day, *category));

    offsets
        .into_iter()
        .filter_map(|(day_offset, category)| {
            let date = planting_date.checked_add_days(Days::new(day_offset as u64))?;
            let pesticides = match category {
                TaskCategory::PestControl => Some(profile.pesticides.clone()),
                _ => None,
            };
            Some(ScheduledTaskOccurrence {
                category,
                day_offset,
                date,
                pesticides,
            })
        })
        .collect()
}

/// F, 2F, 3F, ... strictly below `growth_days`; nothing when F <= 0
fn recurring_offsets(frequency: i32, growth_days: i32) -> Vec<i32> {
    if frequency <= 0 {
        return Vec::new();
    }
    (frequency..growth_days).step_by(frequency as usize).collect()
}

/// Planting date plus the profile's growth period, in calendar days
pub fn expected_harvest_date(planting_date: NaiveDate, profile: &CropGrowthProfile) -> NaiveDate {
    planting_date
        .checked_add_signed(Duration::days(i64::from(profile.growth_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Occurrences falling exactly on the given day offset
pub fn occurrences_on(
    schedule: &[ScheduledTaskOccurrence],
    day_offset: i64,
) -> impl Iterator<Item = &ScheduledTaskOccurrence> {
    schedule
        .iter()
        .filter(move |o| i64::from(o.day_offset) == day_offset)
}
