//! Crop lifecycle monitor tests
//!
//! Covers status transitions, one-time alerts, maintenance reminders and
//! recovery from store failures.

mod common;

use std::sync::Arc;

use common::{crop_grown_for, fixed_now, Harness};
use farm_ops_backend::services::CropLifecycleMonitor;
use farm_ops_backend::store::Collection;
use proptest::prelude::*;
use shared::{
    AlertKind, AlertTarget, CropStatus, GrowthProfileRegistry, LifecycleParams, Priority,
};

fn monitor(harness: &Harness) -> CropLifecycleMonitor {
    monitor_with(harness, LifecycleParams::default())
}

fn monitor_with(harness: &Harness, params: LifecycleParams) -> CropLifecycleMonitor {
    CropLifecycleMonitor::new(
        harness.stores.crops.clone(),
        Arc::new(GrowthProfileRegistry::builtin()),
        params,
    )
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_planted_crop_starts_growing_exactly_once() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Maize", 3, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    let first = monitor.run(&harness.session, now).await.unwrap();
    assert_eq!(first.transitioned, 1);
    assert_eq!(first.alerts_emitted, 1);

    for _ in 0..3 {
        let again = monitor.run(&harness.session, now).await.unwrap();
        assert_eq!(again.transitioned, 0);
        assert_eq!(again.alerts_emitted, 0);
    }

    let stored = harness.crop(&crop).await;
    assert_eq!(stored.status, CropStatus::Growing);
    assert!(stored.reminders.growth_started_sent);

    let updates = harness.alerts_of_type("crop_status_update").await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].priority, Priority::Low);
    assert_eq!(
        updates[0].kind,
        AlertKind::CropStatusUpdate {
            crop_name: crop.name.clone(),
            from: CropStatus::Planted,
            to: CropStatus::Growing,
        }
    );
}

#[tokio::test]
async fn test_growth_alert_not_repeated_after_session_reset() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Beans", 5, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    monitor.run(&harness.session, now).await.unwrap();
    harness.session.reset();
    monitor.run(&harness.session, now).await.unwrap();

    assert_eq!(harness.alerts_of_type("crop_status_update").await.len(), 1);
}

#[tokio::test]
async fn test_crop_too_young_stays_planted() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Maize", 2, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();

    let report = monitor(&harness).run(&harness.session, now).await.unwrap();

    assert_eq!(report.transitioned, 0);
    assert_eq!(harness.crop(&crop).await.status, CropStatus::Planted);
    assert!(harness.alerts().await.is_empty());
}

#[tokio::test]
async fn test_crop_past_growth_period_is_harvested() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Maize", 90, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    monitor.run(&harness.session, now).await.unwrap();

    let stored = harness.crop(&crop).await;
    assert_eq!(stored.status, CropStatus::Harvested);
    assert_eq!(stored.harvest_date, Some(now.date_naive()));
    assert!(stored.reminders.harvested_sent);

    let harvested = harness.alerts_of_type("crop_harvested").await;
    assert_eq!(harvested.len(), 1);
    assert_eq!(harvested[0].priority, Priority::High);

    // Finished crops are left alone afterwards
    let again = monitor.run(&harness.session, now).await.unwrap();
    assert_eq!(again.evaluated, 0);
    assert_eq!(harness.alerts_of_type("crop_harvested").await.len(), 1);
}

#[tokio::test]
async fn test_failed_crop_is_ignored() {
    let harness = Harness::new();
    let now = fixed_now();
    let mut crop = crop_grown_for("Maize", 95, now);
    crop.status = CropStatus::Failed;
    harness.memory.upsert_crop(crop.clone()).unwrap();

    let report = monitor(&harness).run(&harness.session, now).await.unwrap();

    assert_eq!(report.evaluated, 0);
    assert_eq!(harness.crop(&crop).await.status, CropStatus::Failed);
    assert!(harness.alerts().await.is_empty());
}

#[tokio::test]
async fn test_unknown_profile_is_skipped() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Dragonfruit", 40, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();

    let report = monitor(&harness).run(&harness.session, now).await.unwrap();

    assert_eq!(report.evaluated, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.crop(&crop).await.status, CropStatus::Planted);
}

// ============================================================================
// Reminders
// ============================================================================

#[tokio::test]
async fn test_maize_day_21_weeding_and_fertilizer() {
    let harness = Harness::new();
    let now = fixed_now();
    let mut crop = crop_grown_for("Maize", 21, now);
    crop.status = CropStatus::Growing;
    crop.reminders.growth_started_sent = true;
    harness.memory.upsert_crop(crop.clone()).unwrap();

    monitor(&harness).run(&harness.session, now).await.unwrap();

    let types: Vec<&str> = harness
        .alerts()
        .await
        .iter()
        .map(|a| a.type_tag())
        .collect();
    assert_eq!(types.len(), 2);
    assert!(types.contains(&"weeding_due"));
    assert!(types.contains(&"fertilizer_due"));
}

#[tokio::test]
async fn test_irrigation_cadence() {
    let now = fixed_now();
    for (day, expected) in [(6, false), (7, true), (8, false), (10, true), (13, true), (14, false)] {
        let harness = Harness::new();
        let mut crop = crop_grown_for("Maize", day, now);
        crop.status = CropStatus::Growing;
        crop.reminders.growth_started_sent = true;
        harness.memory.upsert_crop(crop).unwrap();

        monitor(&harness).run(&harness.session, now).await.unwrap();

        let irrigation = harness.alerts_of_type("irrigation_due").await;
        assert_eq!(irrigation.len(), usize::from(expected), "day {}", day);
    }
}

#[tokio::test]
async fn test_pest_control_reminder_is_opt_in() {
    let now = fixed_now();

    let harness = Harness::new();
    let mut crop = crop_grown_for("Maize", 14, now);
    crop.status = CropStatus::Growing;
    crop.reminders.growth_started_sent = true;
    harness.memory.upsert_crop(crop.clone()).unwrap();
    monitor(&harness).run(&harness.session, now).await.unwrap();
    assert!(harness.alerts_of_type("pest_control_due").await.is_empty());

    let harness = Harness::new();
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let params = LifecycleParams {
        alert_pest_control: true,
        ..LifecycleParams::default()
    };
    monitor_with(&harness, params)
        .run(&harness.session, now)
        .await
        .unwrap();

    let pest = harness.alerts_of_type("pest_control_due").await;
    assert_eq!(pest.len(), 1);
    match &pest[0].kind {
        AlertKind::PestControlDue { pesticides, day, .. } => {
            assert_eq!(*day, 14);
            assert!(!pesticides.is_empty());
        }
        other => panic!("unexpected alert {:?}", other),
    }
}

#[tokio::test]
async fn test_harvest_approaching_once_within_lookahead() {
    let harness = Harness::new();
    let now = fixed_now();
    let mut crop = crop_grown_for("Maize", 84, now);
    crop.status = CropStatus::Growing;
    crop.reminders.growth_started_sent = true;
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    monitor.run(&harness.session, now).await.unwrap();
    monitor
        .run(&harness.session, now + chrono::Duration::days(1))
        .await
        .unwrap();

    let approaching = harness.alerts_of_type("harvest_approaching").await;
    assert_eq!(approaching.len(), 1);
    assert_eq!(approaching[0].priority, Priority::Medium);
    assert!(harness.crop(&crop).await.reminders.harvest_approaching_sent);
}

#[tokio::test]
async fn test_alerts_target_crop_owner() {
    let harness = Harness::new();
    let now = fixed_now();
    let owner = uuid::Uuid::new_v4();
    let mut crop = crop_grown_for("Maize", 3, now);
    crop.owner_id = Some(owner);
    harness.memory.upsert_crop(crop).unwrap();

    monitor(&harness).run(&harness.session, now).await.unwrap();

    let alerts = harness.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].target, AlertTarget::User(owner));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_crop_read_failure_aborts_pass() {
    let harness = Harness::new();
    harness.memory.fail_reads(Collection::Crops, true);

    let result = monitor(&harness).run(&harness.session, fixed_now()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_status_write_failure_retried_next_pass() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Maize", 4, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    harness.memory.fail_writes(Collection::Crops, true);
    let report = monitor.run(&harness.session, now).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(harness.crop(&crop).await.status, CropStatus::Planted);
    assert!(harness.alerts().await.is_empty());

    harness.memory.fail_writes(Collection::Crops, false);
    let report = monitor.run(&harness.session, now).await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(harness.crop(&crop).await.status, CropStatus::Growing);
    assert_eq!(harness.alerts_of_type("crop_status_update").await.len(), 1);
}

#[tokio::test]
async fn test_alert_write_failure_retried_next_pass() {
    let harness = Harness::new();
    let now = fixed_now();
    let crop = crop_grown_for("Maize", 4, now);
    harness.memory.upsert_crop(crop.clone()).unwrap();
    let monitor = monitor(&harness);

    harness.memory.fail_writes(Collection::Notifications, true);
    monitor.run(&harness.session, now).await.unwrap();

    // The transition stands even though its alert was lost
    let stored = harness.crop(&crop).await;
    assert_eq!(stored.status, CropStatus::Growing);
    assert!(!stored.reminders.growth_started_sent);

    harness.memory.fail_writes(Collection::Notifications, false);
    let report = monitor.run(&harness.session, now).await.unwrap();
    assert_eq!(report.transitioned, 0);
    assert_eq!(report.alerts_emitted, 1);
    assert!(harness.crop(&crop).await.reminders.growth_started_sent);
}

#[tokio::test]
async fn test_harvested_crop_with_undelivered_alert_is_completed() {
    let harness = Harness::new();
    let now = fixed_now();
    let mut harvested = crop_grown_for("Maize", 100, now);
    harvested.status = CropStatus::Harvested;
    harvested.harvest_date = Some(now.date_naive() - chrono::Duration::days(10));
    let young = crop_grown_for("Beans", 5, now);
    harness.memory.upsert_crop(harvested.clone()).unwrap();
    harness.memory.upsert_crop(young.clone()).unwrap();

    let report = monitor(&harness).run(&harness.session, now).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(harness.crop(&young).await.status, CropStatus::Growing);

    let alerts = harness.alerts_of_type("crop_harvested").await;
    assert_eq!(alerts.len(), 1);
    // The recorded harvest date is kept
    assert_eq!(
        alerts[0].kind,
        AlertKind::CropHarvested {
            crop_name: harvested.name.clone(),
            harvest_date: now.date_naive() - chrono::Duration::days(10),
        }
    );
    assert!(harness.crop(&harvested).await.reminders.harvested_sent);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Status never moves backward, whatever the crop's age
    #[test]
    fn prop_status_only_moves_forward(days in -10i64..200, start in 0usize..2) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let harness = Harness::new();
            let now = fixed_now();
            let mut crop = crop_grown_for("Maize", days, now);
            crop.status = [CropStatus::Planted, CropStatus::Growing][start];
            let before = crop.status;
            harness.memory.upsert_crop(crop.clone()).unwrap();

            monitor(&harness).run(&harness.session, now).await.unwrap();

            let after = harness.crop(&crop).await.status;
            prop_assert!(after == before || before.can_advance_to(after));
            Ok(())
        })?;
    }
}
