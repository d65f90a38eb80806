//! Relationship service
//!
//! Friend requests, follows and blocks. Every mutation returns the
//! post-mutation snapshot so callers never need a follow-up read.

use std::sync::Arc;

use super::notification::{NotificationEvent, NotificationSink, fan_out};
use super::{PageRequest, Pagination};
use crate::data::{
    Database, NotificationRefs, NotificationType, RelationshipSnapshot, UserRelations,
    UserSummary,
};
use crate::error::AppError;
use crate::metrics::RELATIONSHIP_EVENTS_TOTAL;

fn ensure_distinct(actor_id: &str, target_id: &str, action: &str) -> Result<(), AppError> {
    if actor_id.trim().is_empty() || target_id.trim().is_empty() {
        return Err(AppError::Validation("user id is required".to_string()));
    }
    if actor_id == target_id {
        return Err(AppError::Validation(format!("cannot {action} yourself")));
    }
    Ok(())
}

fn record_event(action: &str, actor_id: &str, target_id: &str) {
    RELATIONSHIP_EVENTS_TOTAL.with_label_values(&[action]).inc();
    tracing::info!(action, actor = %actor_id, target = %target_id, "Relationship updated");
}

/// Relationship service
pub struct RelationshipService {
    db: Arc<Database>,
    notifications: Arc<dyn NotificationSink>,
}

impl RelationshipService {
    /// Create new relationship service
    pub fn new(db: Arc<Database>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self { db, notifications }
    }

    // =========================================================================
    // Friend requests
    // =========================================================================

    /// Send a friend request
    ///
    /// # Errors
    /// - `Validation` when sender and receiver are the same
    /// - `NotFound` when either user is unknown
    /// - `Conflict` when already friends, a request exists in either
    ///   direction, or a block separates the pair
    ///
    /// # Side Effects
    /// Emits `friend_request` to the receiver.
    pub async fn send_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(sender_id, receiver_id, "send a friend request to")?;

        let snapshot = self.db.send_friend_request(sender_id, receiver_id).await?;
        record_event("send_request", sender_id, receiver_id);

        fan_out(
            self.notifications.as_ref(),
            NotificationEvent::new(
                receiver_id,
                sender_id,
                NotificationType::FriendRequest,
                NotificationRefs::default(),
            ),
        )
        .await;

        Ok(snapshot)
    }

    /// Accept the pending request `sender_id -> receiver_id`
    ///
    /// # Side Effects
    /// Emits `friend_accept` to the requesting user.
    pub async fn accept_request(
        &self,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(receiver_id, sender_id, "accept a friend request from")?;

        let snapshot = self.db.accept_friend_request(receiver_id, sender_id).await?;
        record_event("accept_request", receiver_id, sender_id);

        fan_out(
            self.notifications.as_ref(),
            NotificationEvent::new(
                sender_id,
                receiver_id,
                NotificationType::FriendAccept,
                NotificationRefs::default(),
            ),
        )
        .await;

        Ok(snapshot)
    }

    pub async fn reject_request(
        &self,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(receiver_id, sender_id, "reject a friend request from")?;

        let snapshot = self
            .db
            .delete_friend_request(sender_id, receiver_id, receiver_id)
            .await?;
        record_event("reject_request", receiver_id, sender_id);
        Ok(snapshot)
    }

    /// Withdraw an outgoing request
    pub async fn cancel_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(sender_id, receiver_id, "cancel a friend request to")?;

        let snapshot = self
            .db
            .delete_friend_request(sender_id, receiver_id, sender_id)
            .await?;
        record_event("cancel_request", sender_id, receiver_id);
        Ok(snapshot)
    }

    /// Pending incoming requests, newest first
    pub async fn incoming_requests(
        &self,
        receiver_id: &str,
        request: PageRequest,
    ) -> Result<(Vec<UserSummary>, Pagination), AppError> {
        let senders = self
            .db
            .get_incoming_friend_requests(receiver_id, request.limit(), request.offset())
            .await?;
        let total = self.db.count_incoming_friend_requests(receiver_id).await?;
        Ok((senders, Pagination::new(request, total)))
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Toggle the follow edge `actor_id -> target_id`
    ///
    /// Returns whether the actor follows the target afterwards.
    pub async fn toggle_follow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<(bool, RelationshipSnapshot), AppError> {
        ensure_distinct(actor_id, target_id, "follow")?;

        let (following, snapshot) = self.db.toggle_follow(actor_id, target_id).await?;
        record_event(if following { "follow" } else { "unfollow" }, actor_id, target_id);
        Ok((following, snapshot))
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Block a user, purging every follow and request between the pair
    pub async fn block(
        &self,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(blocker_id, blocked_id, "block")?;

        let snapshot = self.db.block_user(blocker_id, blocked_id).await?;
        record_event("block", blocker_id, blocked_id);
        Ok(snapshot)
    }

    /// Remove the block edge; purged history is not restored
    pub async fn unblock(
        &self,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        ensure_distinct(blocker_id, blocked_id, "unblock")?;

        let snapshot = self.db.unblock_user(blocker_id, blocked_id).await?;
        record_event("unblock", blocker_id, blocked_id);
        Ok(snapshot)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Pair state from `actor_id`'s perspective
    pub async fn relationship(
        &self,
        actor_id: &str,
        other_id: &str,
    ) -> Result<RelationshipSnapshot, AppError> {
        if self.db.get_user(other_id).await?.is_none() {
            return Err(AppError::NotFound("User".to_string()));
        }
        self.db.get_relationship(actor_id, other_id).await
    }

    pub async fn relations(&self, user_id: &str) -> Result<UserRelations, AppError> {
        self.db.get_user_relations(user_id).await
    }

    pub async fn friends(&self, user_id: &str) -> Result<Vec<UserSummary>, AppError> {
        self.db.get_friends(user_id).await
    }

    pub async fn blocked_users(&self, user_id: &str) -> Result<Vec<UserSummary>, AppError> {
        self.db.get_blocked_users(user_id).await
    }
}
