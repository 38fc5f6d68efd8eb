//! HTTP handlers for alert notifications

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use shared::AlertEvent;

use crate::error::{AppError, AppResult};
use crate::store::AlertQuery;
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub user_id: Option<Uuid>,
    pub unread_only: Option<bool>,
    pub limit: Option<usize>,
}

/// List alerts, newest first
pub async fn get_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Vec<AlertEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(AppError::ValidationError("limit must be at least 1".to_string()));
    }

    let alerts = state
        .sink
        .list(AlertQuery {
            user_id: query.user_id,
            unread_only: query.unread_only.unwrap_or(false),
            limit: limit.min(MAX_LIMIT),
        })
        .await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

/// Unread count response
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Unread alerts visible to a user
pub async fn get_unread_count(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UnreadCountResponse>> {
    let count = state.sink.unread_count(query.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Mark notification as read
pub async fn mark_as_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<AlertEvent>> {
    state.sink.mark_read(notification_id).await?;
    let alert = state.sink.get(notification_id).await?;
    Ok(Json(alert))
}

#[derive(Debug, Deserialize)]
pub struct MarkAllReadInput {
    pub user_id: Uuid,
}

/// Mark all read response
#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked_count: u64,
}

/// Mark everything visible to a user as read
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    Json(input): Json<MarkAllReadInput>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let marked_count = state.sink.mark_all_read(input.user_id).await?;
    Ok(Json(MarkAllReadResponse { marked_count }))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Only events visible to this user
    pub user_id: Option<Uuid>,
}

/// Server-Sent Events feed of alerts as they are created
pub async fn stream_notifications(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = query.user_id;
    tracing::debug!(?user_id, "Notification stream opened");

    let stream = BroadcastStream::new(state.sink.subscribe()).filter_map(move |result| async move {
        match result {
            Ok(alert) if user_id.map_or(true, |user| alert.target.includes(user)) => {
                Event::default()
                    .event(alert.type_tag())
                    .id(alert.id.to_string())
                    .json_data(&alert)
                    .ok()
                    .map(Ok)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Notification stream subscriber lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
