//! Interaction service
//!
//! Registers content authorship and handles the remaining interactions
//! that fan out notifications: comments, shares and story likes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::notification::{NotificationEvent, NotificationSink, fan_out};
use super::{PageRequest, Pagination, ReactionView, ensure_no_block};
use crate::data::{
    Comment, Database, EntityId, NotificationRefs, NotificationType, Post, Reactor,
    ReactionSummary, Story,
};
use crate::error::AppError;

const MAX_COMMENT_CHARS: usize = 2000;

/// A post as seen by one viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    pub id: String,
    pub author_id: String,
    pub share_count: i64,
    pub comment_count: i64,
    pub reactions: ReactionView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryLikeState {
    pub liked: bool,
    pub likes_count: i64,
}

/// Interaction service
pub struct InteractionService {
    db: Arc<Database>,
    notifications: Arc<dyn NotificationSink>,
    enforce_blocks: bool,
}

impl InteractionService {
    /// Create new interaction service
    pub fn new(
        db: Arc<Database>,
        notifications: Arc<dyn NotificationSink>,
        enforce_blocks: bool,
    ) -> Self {
        Self {
            db,
            notifications,
            enforce_blocks,
        }
    }

    async fn load_post(&self, post_id: &str) -> Result<Post, AppError> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post".to_string()))
    }

    async fn check_block(&self, actor_id: &str, author_id: &str) -> Result<(), AppError> {
        if self.enforce_blocks {
            ensure_no_block(&self.db, actor_id, author_id).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Content registration
    // =========================================================================

    pub async fn create_post(&self, author_id: &str) -> Result<Post, AppError> {
        let post = Post {
            id: EntityId::new().0,
            author_id: author_id.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_post(&post).await?;
        tracing::debug!(author = %author_id, post_id = %post.id, "Post registered");
        Ok(post)
    }

    pub async fn create_story(&self, author_id: &str) -> Result<Story, AppError> {
        let story = Story {
            id: EntityId::new().0,
            author_id: author_id.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_story(&story).await?;
        tracing::debug!(author = %author_id, story_id = %story.id, "Story registered");
        Ok(story)
    }

    /// Counters and reaction summary of a post
    pub async fn content(&self, viewer_id: &str, post_id: &str) -> Result<ContentView, AppError> {
        let post = self.load_post(post_id).await?;
        let (entries, share_count, comment_count) = futures::try_join!(
            self.db.get_reaction_entries(post_id),
            self.db.count_shares(post_id),
            self.db.count_comments(post_id),
        )?;
        let my_reaction = entries
            .iter()
            .find(|entry| entry.user_id == viewer_id)
            .map(|entry| entry.reaction_type);

        Ok(ContentView {
            share_count,
            comment_count,
            reactions: ReactionView {
                summary: ReactionSummary::from_entries(&entries),
                my_reaction,
            },
            id: post.id,
            author_id: post.author_id,
        })
    }

    /// Reactors of a post, most recent first
    pub async fn reactors(
        &self,
        post_id: &str,
        request: PageRequest,
    ) -> Result<(Vec<Reactor>, Pagination), AppError> {
        self.load_post(post_id).await?;
        let reactors = self
            .db
            .get_reactors(post_id, request.limit(), request.offset())
            .await?;
        let total = self.db.count_reactions(post_id).await?;
        Ok((reactors, Pagination::new(request, total)))
    }

    // =========================================================================
    // Comments / Shares
    // =========================================================================

    /// Add a comment to a post
    ///
    /// # Side Effects
    /// Emits `comment` (post + comment refs) to the post owner.
    pub async fn add_comment(
        &self,
        actor_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<Comment, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("comment content is required".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::Validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }

        let post = self.load_post(post_id).await?;
        self.check_block(actor_id, &post.author_id).await?;

        let comment = Comment {
            id: EntityId::new().0,
            post_id: post.id.clone(),
            author_id: actor_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_comment(&comment).await?;

        fan_out(
            self.notifications.as_ref(),
            NotificationEvent::new(
                &post.author_id,
                actor_id,
                NotificationType::Comment,
                NotificationRefs::comment(&post.id, &comment.id),
            ),
        )
        .await;

        Ok(comment)
    }

    /// Share a post and return its new share count
    pub async fn share(&self, actor_id: &str, post_id: &str) -> Result<i64, AppError> {
        let post = self.load_post(post_id).await?;
        self.check_block(actor_id, &post.author_id).await?;

        let share_count = self.db.insert_share(post_id, actor_id).await?;

        fan_out(
            self.notifications.as_ref(),
            NotificationEvent::new(
                &post.author_id,
                actor_id,
                NotificationType::Share,
                NotificationRefs::post(post_id),
            ),
        )
        .await;

        Ok(share_count)
    }

    // =========================================================================
    // Stories
    // =========================================================================

    /// Toggle `actor_id`'s like on a story; only a new like notifies
    pub async fn toggle_story_like(
        &self,
        actor_id: &str,
        story_id: &str,
    ) -> Result<StoryLikeState, AppError> {
        let story = self
            .db
            .get_story(story_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Story".to_string()))?;

        let already_liked = self.db.has_story_like(story_id, actor_id).await?;
        if !already_liked {
            self.check_block(actor_id, &story.author_id).await?;
        }

        let (liked, likes_count) = self.db.toggle_story_like(story_id, actor_id).await?;

        if liked {
            fan_out(
                self.notifications.as_ref(),
                NotificationEvent::new(
                    &story.author_id,
                    actor_id,
                    NotificationType::StoryLike,
                    NotificationRefs::story(story_id),
                ),
            )
            .await;
        }

        Ok(StoryLikeState { liked, likes_count })
    }
}
