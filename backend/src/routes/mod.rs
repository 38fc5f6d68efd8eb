//! Route definitions for the Farm Operations API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/profiles", profile_routes())
        .route("/crops/:crop_id/schedule", get(handlers::get_crop_schedule))
        .nest("/notifications", notification_routes())
        .nest("/monitoring", monitoring_routes())
}

/// Growth profile routes
fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_profiles))
        .route("/:name", get(handlers::get_profile))
}

/// Alert notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_notifications))
        .route("/unread-count", get(handlers::get_unread_count))
        .route("/stream", get(handlers::stream_notifications))
        .route("/read-all", post(handlers::mark_all_as_read))
        .route("/:notification_id/read", post(handlers::mark_as_read))
}

/// Monitoring engine routes
fn monitoring_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/restart", post(handlers::restart))
}
