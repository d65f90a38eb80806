//! Notification service
//!
//! Persists one record per qualifying event and serves the recipient's
//! inbox. Producers only see the `NotificationSink` capability.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;

use super::{PageRequest, Pagination};
use crate::config::NotificationConfig;
use crate::data::{
    Database, EntityId, Notification, NotificationRefs, NotificationType, NotificationWithSender,
};
use crate::error::AppError;
use crate::metrics::{
    NOTIFICATION_FAILURES_TOTAL, NOTIFICATIONS_CREATED_TOTAL, NOTIFICATIONS_PURGED_TOTAL,
};

/// A qualifying event, before it is rendered into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub recipient_id: String,
    pub sender_id: String,
    pub notification_type: NotificationType,
    pub refs: NotificationRefs,
}

impl NotificationEvent {
    pub fn new(
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        refs: NotificationRefs,
    ) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.to_string(),
            notification_type,
            refs,
        }
    }
}

/// Capability to record a notification
///
/// Returns `Ok(None)` when the event does not qualify (self-notification,
/// unknown sender).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create(&self, event: NotificationEvent) -> Result<Option<Notification>, AppError>;
}

/// Deliver an event without letting a failure escape
///
/// The triggering action has already committed; errors are logged and
/// counted only.
pub async fn fan_out(sink: &dyn NotificationSink, event: NotificationEvent) {
    let notification_type = event.notification_type;
    let recipient_id = event.recipient_id.clone();

    if let Err(error) = sink.create(event).await {
        NOTIFICATION_FAILURES_TOTAL
            .with_label_values(&[notification_type.as_str()])
            .inc();
        tracing::warn!(
            %error,
            %notification_type,
            recipient = %recipient_id,
            "Notification fan-out failed"
        );
    }
}

/// One page of a recipient's inbox
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub data: Vec<NotificationWithSender>,
    pub pagination: Pagination,
}

/// Notification service
pub struct NotificationService {
    db: Arc<Database>,
    config: NotificationConfig,
}

impl NotificationService {
    /// Create new notification service
    pub fn new(db: Arc<Database>, config: NotificationConfig) -> Self {
        Self { db, config }
    }

    /// Newest-first page of `recipient_id`'s notifications
    pub async fn list(
        &self,
        recipient_id: &str,
        request: PageRequest,
    ) -> Result<NotificationPage, AppError> {
        let data = self
            .db
            .get_notifications(recipient_id, request.limit(), request.offset())
            .await?;
        let total = self.db.count_notifications(recipient_id).await?;

        Ok(NotificationPage {
            data,
            pagination: Pagination::new(request, total),
        })
    }

    /// Mark one notification as read
    ///
    /// Already-read records succeed unchanged. A record that is missing or
    /// addressed to someone else is `NotFound`.
    pub async fn mark_read(&self, id: &str, recipient_id: &str) -> Result<Notification, AppError> {
        self.db
            .mark_notification_read(id, recipient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification".to_string()))
    }

    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        let updated = self.db.mark_all_notifications_read(recipient_id).await?;
        tracing::debug!(recipient = %recipient_id, updated, "Marked notifications read");
        Ok(updated)
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<i64, AppError> {
        self.db.count_unread_notifications(recipient_id).await
    }

    /// Delete notifications older than the retention window
    ///
    /// A retention of 0 days keeps everything.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        if self.config.retention_days == 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(i64::from(self.config.retention_days));
        let purged = self.db.delete_notifications_before(cutoff).await?;
        NOTIFICATIONS_PURGED_TOTAL.inc_by(purged);

        if purged > 0 {
            tracing::info!(purged, %cutoff, "Purged expired notifications");
        }

        Ok(purged)
    }
}

#[async_trait]
impl NotificationSink for NotificationService {
    async fn create(&self, event: NotificationEvent) -> Result<Option<Notification>, AppError> {
        if event.recipient_id == event.sender_id {
            return Ok(None);
        }

        let Some(sender) = self.db.get_user(&event.sender_id).await? else {
            tracing::warn!(
                sender = %event.sender_id,
                notification_type = %event.notification_type,
                "Skipping notification from unknown sender"
            );
            return Ok(None);
        };

        let notification = Notification {
            id: EntityId::new().0,
            recipient_id: event.recipient_id,
            sender_id: event.sender_id,
            notification_type: event.notification_type.as_str().to_string(),
            post_id: event.refs.post_id,
            story_id: event.refs.story_id,
            comment_id: event.refs.comment_id,
            message: event
                .notification_type
                .render_message(sender.display_name()),
            is_read: false,
            created_at: Utc::now(),
        };

        self.db.insert_notification(&notification).await?;
        NOTIFICATIONS_CREATED_TOTAL
            .with_label_values(&[event.notification_type.as_str()])
            .inc();

        Ok(Some(notification))
    }
}
