//! Conversion functions from data models to API DTOs

use crate::api::dto::*;
use crate::data::{Comment, Notification, NotificationWithSender, RelationshipSnapshot};

/// Convert a snapshot to the caller-relative relationship body
pub fn relationship_to_response(snapshot: &RelationshipSnapshot) -> RelationshipResponse {
    let pair = &snapshot.pair;
    RelationshipResponse {
        id: snapshot.user_id.clone(),
        following: pair.following,
        followed_by: pair.followed_by,
        friends: pair.is_friend(),
        requested: pair.requested,
        requested_by: pair.requested_by,
        blocking: pair.blocking,
        blocked_by: pair.blocked_by,
    }
}

pub fn mutation_to_response(snapshot: &RelationshipSnapshot) -> RelationshipMutationResponse {
    RelationshipMutationResponse {
        status: true,
        relationship: relationship_to_response(snapshot),
        counts: snapshot.counts,
    }
}

pub fn notification_to_response(row: &NotificationWithSender) -> NotificationResponse {
    NotificationResponse {
        sender: NotificationSenderResponse {
            id: row.notification.sender_id.clone(),
            username: row.sender_username.clone(),
            name: row.sender_name.clone(),
            profile_picture: row.sender_profile_picture.clone(),
        },
        ..bare_notification_to_response(&row.notification)
    }
}

/// Notification without joined sender fields
pub fn bare_notification_to_response(notification: &Notification) -> NotificationResponse {
    NotificationResponse {
        id: notification.id.clone(),
        notification_type: notification.notification_type.clone(),
        sender: NotificationSenderResponse {
            id: notification.sender_id.clone(),
            username: None,
            name: None,
            profile_picture: None,
        },
        post_id: notification.post_id.clone(),
        story_id: notification.story_id.clone(),
        comment_id: notification.comment_id.clone(),
        message: notification.message.clone(),
        is_read: notification.is_read,
        created_at: notification.created_at,
    }
}

pub fn comment_to_response(comment: Comment) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        post_id: comment.post_id,
        author_id: comment.author_id,
        content: comment.content,
        created_at: comment.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PairState, RelationshipCounts};

    #[test]
    fn friends_flag_is_derived_from_mutual_follow() {
        let snapshot = RelationshipSnapshot {
            user_id: "bob".to_string(),
            pair: PairState {
                following: true,
                followed_by: true,
                ..PairState::default()
            },
            counts: RelationshipCounts::default(),
        };

        let response = relationship_to_response(&snapshot);
        assert!(response.friends);
        assert_eq!(response.id, "bob");

        let body = serde_json::to_value(mutation_to_response(&snapshot)).unwrap();
        assert_eq!(body["status"], true);
        assert_eq!(body["relationship"]["followedBy"], true);
        assert_eq!(body["counts"]["pendingRequests"], 0);
    }
}
