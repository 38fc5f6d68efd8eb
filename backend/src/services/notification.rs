//! Notification sink for alert events
//!
//! Supports:
//! - Persisting alert events through the notification store
//! - Read/unread management per user
//! - Live fan-out to subscribers (SSE stream, tests)
//! - Best-effort LINE push for urgent alerts

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use shared::{AlertEvent, NewAlert};

use crate::config::NotifierConfig;
use crate::error::{AppError, AppResult};
use crate::store::{AlertQuery, NotificationStore};

const LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

/// A system-level notification derived from an alert
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Alert type tag; notifications with the same tag replace each other
    pub tag: &'static str,
}

impl SystemNotification {
    pub fn from_event(event: &AlertEvent, icon: Option<String>) -> Self {
        Self {
            title: event.title.clone(),
            body: event.message.clone(),
            icon,
            tag: event.type_tag(),
        }
    }
}

/// Outbound channel for urgent alerts
#[async_trait]
pub trait SystemNotifier: Send + Sync {
    async fn notify(&self, notification: &SystemNotification) -> AppResult<()>;
}

// ============================================================================
// LINE Messaging API
// ============================================================================

/// LINE message object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LineMessage {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender: Option<LineSender>,
    },
}

/// Sender override shown next to a LINE message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSender {
    pub name: String,
    #[serde(rename = "iconUrl", skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinePushRequest {
    to: String,
    messages: Vec<LineMessage>,
}

#[derive(Debug, Deserialize)]
struct LineApiResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Pushes urgent alerts to one LINE user or group
#[derive(Clone)]
pub struct LineNotifier {
    channel_access_token: String,
    recipient: String,
    http_client: reqwest::Client,
}

impl LineNotifier {
    pub fn new(channel_access_token: String, recipient: String) -> Self {
        Self {
            channel_access_token,
            recipient,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build from configuration; `None` unless enabled with token and recipient
    pub fn from_config(config: &NotifierConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let token = config.line_channel_token.clone()?;
        let recipient = config.line_recipient.clone()?;
        Some(Self::new(token, recipient))
    }

    /// Render a notification as a LINE text message
    pub fn message_for(notification: &SystemNotification) -> LineMessage {
        LineMessage::Text {
            text: format!("{}\n\n{}", notification.title, notification.body),
            sender: Some(LineSender {
                // LINE caps sender names at 20 characters
                name: notification.tag.chars().take(20).collect(),
                icon_url: notification.icon.clone(),
            }),
        }
    }
}

#[async_trait]
impl SystemNotifier for LineNotifier {
    async fn notify(&self, notification: &SystemNotification) -> AppResult<()> {
        let request = LinePushRequest {
            to: self.recipient.clone(),
            messages: vec![Self::message_for(notification)],
        };

        let response = self
            .http_client
            .post(LINE_PUSH_URL)
            .header("Authorization", format!("Bearer {}", self.channel_access_token))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LineApiError(format!("Failed to send LINE message: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let error = response
            .json::<LineApiResponse>()
            .await
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| format!("HTTP {}", status));
        Err(AppError::LineApiError(error))
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Persists alert events and fans them out
pub struct NotificationSink {
    store: Arc<dyn NotificationStore>,
    live: broadcast::Sender<AlertEvent>,
    notifier: Option<Arc<dyn SystemNotifier>>,
    icon_url: Option<String>,
}

impl NotificationSink {
    pub fn new(store: Arc<dyn NotificationStore>, live_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(live_capacity.max(1));
        Self {
            store,
            live,
            notifier: None,
            icon_url: None,
        }
    }

    /// Enable system notifications for urgent alerts
    pub fn with_notifier(mut self, notifier: Arc<dyn SystemNotifier>, icon_url: Option<String>) -> Self {
        self.notifier = Some(notifier);
        self.icon_url = icon_url;
        self
    }

    /// Persist an alert as a new unread event and publish it.
    ///
    /// Urgent alerts additionally trigger a system notification in the
    /// background; its failure is logged and never affects the result.
    pub async fn create(&self, alert: NewAlert) -> AppResult<AlertEvent> {
        let event = AlertEvent::from_new(alert, Utc::now());
        self.store.insert_alert(&event).await?;

        tracing::info!(
            alert_id = %event.id,
            alert_type = event.type_tag(),
            priority = event.priority.as_str(),
            source = %event.source.id,
            "Alert created"
        );

        // Nobody listening is fine
        let _ = self.live.send(event.clone());

        if event.priority.is_urgent() {
            if let Some(notifier) = &self.notifier {
                let notifier = Arc::clone(notifier);
                let notification = SystemNotification::from_event(&event, self.icon_url.clone());
                tokio::spawn(async move {
                    if let Err(e) = notifier.notify(&notification).await {
                        tracing::warn!(tag = notification.tag, "System notification failed: {}", e);
                    }
                });
            }
        }

        Ok(event)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<AlertEvent> {
        self.store
            .get_alert(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification".to_string()))
    }

    pub async fn mark_read(&self, id: Uuid) -> AppResult<()> {
        if !self.store.mark_read(id).await? {
            return Err(AppError::NotFound("Notification".to_string()));
        }
        Ok(())
    }

    /// Mark everything visible to the user as read
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        self.store.mark_all_read(user_id).await
    }

    pub async fn list(&self, query: AlertQuery) -> AppResult<Vec<AlertEvent>> {
        self.store.list_alerts(query).await
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<u64> {
        self.store.unread_count(user_id).await
    }

    /// Receive every event created from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.live.subscribe()
    }
}
