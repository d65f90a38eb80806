//! Data models
//!
//! Rust structs representing database rows and the read models
//! assembled from them. All entities use ULID ids and chrono timestamps.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Users
// =============================================================================

/// A user known to this service
///
/// Identity is owned by the credential service; this row only
/// carries the display fields needed for notifications and listings.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name shown in rendered notification messages
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.username
        } else {
            &self.name
        }
    }
}

/// Relationship state of one user, assembled from the edge tables
///
/// Mirrors the adjacency sets of the user document: each set is
/// derived from a single edge table, so the two sides of a pair can
/// never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRelations {
    pub user_id: String,
    /// Users this user follows
    pub following: BTreeSet<String>,
    /// Users following this user
    pub followers: BTreeSet<String>,
    /// Users with an outstanding request to this user
    pub friend_requests: BTreeSet<String>,
    /// Users this user has requested
    pub sent_friend_requests: BTreeSet<String>,
    /// Users blocked by this user
    pub blocked_users: BTreeSet<String>,
    /// Users who blocked this user
    pub blocked_by: BTreeSet<String>,
}

/// Friendship is mutual following, never stored.
pub fn is_friend(a: &UserRelations, b: &UserRelations) -> bool {
    a.following.contains(&b.user_id) && b.following.contains(&a.user_id)
}

/// Every edge between two users, seen from `subject`'s side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairState {
    pub following: bool,
    pub followed_by: bool,
    pub requested: bool,
    pub requested_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
}

impl PairState {
    pub fn is_friend(&self) -> bool {
        self.following && self.followed_by
    }

    pub fn has_pending_request(&self) -> bool {
        self.requested || self.requested_by
    }

    pub fn has_block(&self) -> bool {
        self.blocking || self.blocked_by
    }
}

/// Relationship totals for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipCounts {
    pub followers: i64,
    pub following: i64,
    pub friends: i64,
    pub pending_requests: i64,
}

/// Pair state towards `user_id` plus the subject's counts, read back in
/// the same transaction as the mutation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipSnapshot {
    pub user_id: String,
    pub pair: PairState,
    pub counts: RelationshipCounts,
}

/// A user listed alongside the time the listed relation was created
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub since: DateTime<Utc>,
}

// =============================================================================
// Content
// =============================================================================

/// Authorship record of a post held by the content store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

/// Authorship record of a story held by the content store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reactions
// =============================================================================

/// Reaction kinds accepted on a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Care,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 7] = [
        Self::Like,
        Self::Love,
        Self::Care,
        Self::Haha,
        Self::Wow,
        Self::Sad,
        Self::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Care => "care",
            Self::Haha => "haha",
            Self::Wow => "wow",
            Self::Sad => "sad",
            Self::Angry => "angry",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown reaction type: {s}"))
    }
}

/// One row of a post's reaction list, in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEntry {
    pub user_id: String,
    pub reaction_type: ReactionType,
}

/// A reactor listed with their reaction
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reactor {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub reaction_type: String,
    pub since: DateTime<Utc>,
}

/// What a single `set_reaction` call did to the actor's entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTransition {
    Added,
    Changed,
    Removed,
    Unchanged,
}

impl ReactionTransition {
    pub fn between(previous: Option<ReactionType>, current: Option<ReactionType>) -> Self {
        match (previous, current) {
            (None, Some(_)) => Self::Added,
            (Some(_), None) => Self::Removed,
            (Some(before), Some(after)) if before != after => Self::Changed,
            _ => Self::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Result of a reaction read-modify-write, committed atomically
#[derive(Debug, Clone)]
pub struct ReactionOutcome {
    pub post: Post,
    pub previous: Option<ReactionType>,
    pub current: Option<ReactionType>,
    /// Entries after the write, oldest first
    pub entries: Vec<ReactionEntry>,
}

impl ReactionOutcome {
    pub fn transition(&self) -> ReactionTransition {
        ReactionTransition::between(self.previous, self.current)
    }
}

/// Aggregated view of a post's reaction list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub counts: BTreeMap<ReactionType, i64>,
    pub total: i64,
    pub dominant_type: Option<ReactionType>,
}

impl ReactionSummary {
    /// Count entries per type and pick the dominant one
    ///
    /// Ties between equally frequent types go to the type whose first
    /// entry appears earliest in `entries`.
    pub fn from_entries(entries: &[ReactionEntry]) -> Self {
        let mut counts: BTreeMap<ReactionType, i64> = BTreeMap::new();
        let mut first_seen: Vec<ReactionType> = Vec::new();

        for entry in entries {
            *counts.entry(entry.reaction_type).or_default() += 1;
            if !first_seen.contains(&entry.reaction_type) {
                first_seen.push(entry.reaction_type);
            }
        }

        let mut dominant_type: Option<(ReactionType, i64)> = None;
        for kind in first_seen {
            let count = counts.get(&kind).copied().unwrap_or_default();
            match dominant_type {
                Some((_, best)) if best >= count => {}
                _ => dominant_type = Some((kind, count)),
            }
        }

        Self {
            total: entries.len() as i64,
            counts,
            dominant_type: dominant_type.map(|(kind, _)| kind),
        }
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Events that produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Like,
    Comment,
    FriendRequest,
    FriendAccept,
    StoryLike,
    Share,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::FriendRequest => "friend_request",
            Self::FriendAccept => "friend_accept",
            Self::StoryLike => "story_like",
            Self::Share => "share",
        }
    }

    /// Render the stored message for a sender display name
    pub fn render_message(&self, sender_name: &str) -> String {
        match self {
            Self::Like => format!("{sender_name} liked your post"),
            Self::Comment => format!("{sender_name} commented on your post"),
            Self::FriendRequest => format!("{sender_name} sent you a friend request"),
            Self::FriendAccept => format!("{sender_name} accepted your friend request"),
            Self::StoryLike => format!("{sender_name} liked your story"),
            Self::Share => format!("{sender_name} shared your post"),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional content references carried by a notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRefs {
    pub post_id: Option<String>,
    pub story_id: Option<String>,
    pub comment_id: Option<String>,
}

impl NotificationRefs {
    pub fn post(post_id: &str) -> Self {
        Self {
            post_id: Some(post_id.to_string()),
            ..Self::default()
        }
    }

    pub fn story(story_id: &str) -> Self {
        Self {
            story_id: Some(story_id.to_string()),
            ..Self::default()
        }
    }

    pub fn comment(post_id: &str, comment_id: &str) -> Self {
        Self {
            post_id: Some(post_id.to_string()),
            comment_id: Some(comment_id.to_string()),
            ..Self::default()
        }
    }
}

/// Persisted notification
///
/// Immutable once written, except for `is_read`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    /// One of the `NotificationType` strings
    pub notification_type: String,
    pub post_id: Option<String>,
    pub story_id: Option<String>,
    pub comment_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification joined with its sender's display fields
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationWithSender {
    #[sqlx(flatten)]
    pub notification: Notification,
    pub sender_username: Option<String>,
    pub sender_name: Option<String>,
    pub sender_profile_picture: Option<String>,
}
