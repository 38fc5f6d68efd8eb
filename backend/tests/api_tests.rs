//! HTTP API tests
//!
//! Drive the router with `oneshot` against in-memory stores.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use common::Harness;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use farm_ops_backend::{create_app, services::MonitoringEngine, AppState, Config};
use shared::{
    expected_harvest_date, AlertKind, AlertTarget, CropRecord, EntityRef, GrowthProfileRegistry,
    NewAlert,
};

struct TestApp {
    harness: Harness,
    registry: Arc<GrowthProfileRegistry>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let harness = Harness::new();
        let registry = Arc::new(GrowthProfileRegistry::builtin());
        let config = Config::default();
        let engine = Arc::new(MonitoringEngine::new(
            harness.stores.clone(),
            harness.sink.clone(),
            registry.clone(),
            config.monitoring.clone(),
        ));
        let router = create_app(AppState {
            stores: harness.stores.clone(),
            sink: harness.sink.clone(),
            engine,
            registry: registry.clone(),
            config: Arc::new(config),
            storage_kind: "memory",
        });

        Self {
            harness,
            registry,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn out_of_stock(target: AlertTarget) -> NewAlert {
    NewAlert::new(
        AlertKind::OutOfStock {
            item_name: "Bean seed".to_string(),
            unit: "kg".to_string(),
        },
        target,
        EntityRef::inventory_item(Uuid::new_v4()),
    )
}

// ============================================================================
// Health and monitoring
// ============================================================================

#[tokio::test]
async fn test_health_reports_storage_and_engine() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["monitoring"], "stopped");
}

#[tokio::test]
async fn test_monitoring_status_and_restart() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/monitoring/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["interval_secs"], 3600);
    assert_eq!(body["cashflow_every_ticks"], 1);

    let (status, body) = app.post("/api/v1/monitoring/restart", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);

    let (_, body) = app.get("/api/v1/health").await;
    assert_eq!(body["monitoring"], "running");
}

// ============================================================================
// Profiles and schedules
// ============================================================================

#[tokio::test]
async fn test_list_and_get_profiles() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/profiles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), app.registry.profiles().len());

    let (status, body) = app.get("/api/v1/profiles/maize").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Maize");
    assert_eq!(body["growth_days"], 90);
}

#[tokio::test]
async fn test_unknown_profile_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/profiles/Dragonfruit").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_crop_schedule() {
    let app = TestApp::new();
    let planting = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let crop = CropRecord::planted("North field maize", "Maize", planting);
    app.harness.memory.upsert_crop(crop.clone()).unwrap();

    let (status, body) = app.get(&format!("/api/v1/crops/{}/schedule", crop.id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crop_id"], crop.id.to_string());
    assert_eq!(body["profile"], "Maize");
    let maize = app.registry.lookup("Maize").unwrap();
    assert_eq!(
        body["expected_harvest_date"],
        expected_harvest_date(planting, maize).to_string()
    );
    assert!(!body["occurrences"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_crop_schedule_unknown_profile_is_empty() {
    let app = TestApp::new();
    let crop = CropRecord::planted(
        "Trial plot",
        "Quinoa",
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
    );
    app.harness.memory.upsert_crop(crop.clone()).unwrap();

    let (status, body) = app.get(&format!("/api/v1/crops/{}/schedule", crop.id)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["profile"].is_null());
    assert!(body["occurrences"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_crop_schedule_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app
        .get(&format!("/api/v1/crops/{}/schedule", Uuid::new_v4()))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_notification_read_flow() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let mine = app
        .harness
        .sink
        .create(out_of_stock(AlertTarget::User(user)))
        .await
        .unwrap();
    app.harness.sink.create(out_of_stock(AlertTarget::All)).await.unwrap();

    let (status, body) = app.get(&format!("/api/v1/notifications?user_id={}", user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app
        .get(&format!("/api/v1/notifications/unread-count?user_id={}", user))
        .await;
    assert_eq!(body["count"], 2);

    let (status, body) = app
        .post(&format!("/api/v1/notifications/{}/read", mine.id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (status, body) = app
        .post("/api/v1/notifications/read-all", json!({ "user_id": user }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked_count"], 1);

    let (_, body) = app
        .get(&format!("/api/v1/notifications/unread-count?user_id={}", user))
        .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_unread_only_and_limit() {
    let app = TestApp::new();
    for _ in 0..3 {
        app.harness.sink.create(out_of_stock(AlertTarget::All)).await.unwrap();
    }

    let (_, body) = app.get("/api/v1/notifications?limit=2").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let first = body[0]["id"].as_str().unwrap().to_string();
    app.post(&format!("/api/v1/notifications/{}/read", first), json!({}))
        .await;

    let (_, body) = app.get("/api/v1/notifications?unread_only=true").await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_mark_unknown_notification_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app
        .post(&format!("/api/v1/notifications/{}/read", Uuid::new_v4()), json!({}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
