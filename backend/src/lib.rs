//! Farm Operations Scheduling & Alerting Engine - backend
//!
//! Derives maintenance calendars from crop growth profiles, advances crop
//! lifecycle state as time passes, and watches inventory, tasks, soil
//! readings and the ledger for conditions that warrant an alert.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use shared::GrowthProfileRegistry;

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{MonitoringEngine, NotificationSink};
use store::Stores;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub sink: Arc<NotificationSink>,
    pub engine: Arc<MonitoringEngine>,
    pub registry: Arc<GrowthProfileRegistry>,
    pub config: Arc<Config>,
    /// "postgres" or "memory"
    pub storage_kind: &'static str,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Farm Operations API v1"
}
