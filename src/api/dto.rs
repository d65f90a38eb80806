//! API request/response DTOs
//!
//! All bodies use camelCase keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::PaginationConfig;
use crate::data::{RelationshipCounts, UserSummary};
use crate::service::{PageRequest, Pagination};

/// `?page=&limit=` query
///
/// Values that are not positive integers fall back to the defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default, deserialize_with = "lenient_number")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub limit: Option<u32>,
}

impl PaginationParams {
    pub fn page_request(&self, config: &PaginationConfig) -> PageRequest {
        PageRequest::new(self.page, self.limit, config)
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

/// Paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Pair state from the caller's perspective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipResponse {
    pub id: String,
    pub following: bool,
    pub followed_by: bool,
    pub friends: bool,
    pub requested: bool,
    pub requested_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
}

/// Result of any relationship mutation
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipMutationResponse {
    pub status: bool,
    pub relationship: RelationshipResponse,
    pub counts: RelationshipCounts,
}

/// Relationship view with the caller's counts
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipViewResponse {
    #[serde(flatten)]
    pub relationship: RelationshipResponse,
    pub counts: RelationshipCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListResponse {
    pub data: Vec<UserSummary>,
}

/// `PUT /content/:id/reaction` body
///
/// `type` missing or null clears the caller's reaction.
#[derive(Debug, Default, Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "type", default)]
    pub reaction_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

/// Registered post or story
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCreatedResponse {
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub share_count: i64,
}

/// Sender display fields embedded in a notification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSenderResponse {
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub sender: NotificationSenderResponse,
    pub post_id: Option<String>,
    pub story_id: Option<String>,
    pub comment_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReadResponse {
    pub status: bool,
    pub notification: NotificationResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkAllReadResponse {
    pub status: bool,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
