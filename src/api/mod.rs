//! API layer
//!
//! HTTP handlers for:
//! - Friend requests, follows and blocks
//! - Content reactions, comments, shares and story likes
//! - Notifications
//! - Metrics (Prometheus)

mod content;
mod converters;
mod dto;
mod extract;
pub mod metrics;
mod notifications;
mod relationships;

pub use converters::*;
pub use dto::*;

pub use metrics::metrics_router;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::AppState;

/// Create the API router
///
/// Every route requires an authenticated actor; the `CurrentUser`
/// extractor rejects anonymous requests with 401.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Friend requests
        .route("/friend-requests", get(relationships::list_friend_requests))
        .route(
            "/friend-requests/:user_id",
            post(relationships::send_friend_request).delete(relationships::cancel_friend_request),
        )
        .route(
            "/friend-requests/:user_id/accept",
            post(relationships::accept_friend_request),
        )
        .route(
            "/friend-requests/:user_id/reject",
            post(relationships::reject_friend_request),
        )
        .route("/friends", get(relationships::list_friends))
        .route("/blocked-users", get(relationships::list_blocked_users))
        // Relationships
        .route("/relationships/:user_id", get(relationships::get_relationship))
        .route(
            "/relationships/:user_id/follow",
            put(relationships::toggle_follow),
        )
        .route("/relationships/:user_id/block", post(relationships::block_user))
        .route(
            "/relationships/:user_id/unblock",
            post(relationships::unblock_user),
        )
        // Content
        .route("/content", post(content::create_content))
        .route("/content/:id", get(content::get_content))
        .route("/content/:id/reaction", put(content::set_reaction))
        .route("/content/:id/reactions", get(content::list_reactions))
        .route("/content/:id/comments", post(content::add_comment))
        .route("/content/:id/share", post(content::share_content))
        .route("/stories", post(content::create_story))
        .route("/stories/:id/like", put(content::toggle_story_like))
        // Notifications
        .route("/notifications", get(notifications::get_notifications))
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/notifications/mark-all-read",
            patch(notifications::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            patch(notifications::mark_notification_read),
        )
}
