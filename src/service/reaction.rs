//! Reaction service
//!
//! Toggle/replace semantics over a post's reaction ledger. Only a
//! transition from "no entry" to "has entry" notifies the post owner.

use std::sync::Arc;

use serde::Serialize;

use super::ensure_no_block;
use super::notification::{NotificationEvent, NotificationSink, fan_out};
use crate::data::{
    Database, NotificationRefs, NotificationType, ReactionSummary, ReactionTransition,
    ReactionType,
};
use crate::error::AppError;
use crate::metrics::REACTION_TRANSITIONS_TOTAL;

/// Aggregated ledger plus the viewer's own entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionView {
    #[serde(flatten)]
    pub summary: ReactionSummary,
    pub my_reaction: Option<ReactionType>,
}

/// Reaction service
pub struct ReactionService {
    db: Arc<Database>,
    notifications: Arc<dyn NotificationSink>,
    enforce_blocks: bool,
}

impl ReactionService {
    /// Create new reaction service
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

    /// Set, replace or clear `actor_id`'s reaction on a post
    ///
    /// # Arguments
    /// * `desired` - `None` clears; the current type toggles off; any other
    ///   type replaces
    ///
    /// # Errors
    /// - `NotFound` when the post does not exist
    /// - `Forbidden` when adding across a block and blocks are enforced
    pub async fn set_reaction(
        &self,
        actor_id: &str,
        post_id: &str,
        desired: Option<ReactionType>,
    ) -> Result<ReactionView, AppError> {
        if let Some(kind) = desired {
            self.check_block(actor_id, post_id, kind).await?;
        }

        let outcome = self.db.set_reaction(post_id, actor_id, desired).await?;
        let transition = outcome.transition();
        REACTION_TRANSITIONS_TOTAL
            .with_label_values(&[transition.as_str()])
            .inc();
        tracing::debug!(
            actor = %actor_id,
            post_id = %post_id,
            transition = transition.as_str(),
            "Reaction updated"
        );

        if transition == ReactionTransition::Added && outcome.post.author_id != actor_id {
            fan_out(
                self.notifications.as_ref(),
                NotificationEvent::new(
                    &outcome.post.author_id,
                    actor_id,
                    NotificationType::Like,
                    NotificationRefs::post(post_id),
                ),
            )
            .await;
        }

        Ok(ReactionView {
            summary: ReactionSummary::from_entries(&outcome.entries),
            my_reaction: outcome.current,
        })
    }

    /// Current ledger summary as seen by `viewer_id`
    pub async fn view(&self, viewer_id: &str, post_id: &str) -> Result<ReactionView, AppError> {
        let entries = self.db.get_reaction_entries(post_id).await?;
        let my_reaction = entries
            .iter()
            .find(|entry| entry.user_id == viewer_id)
            .map(|entry| entry.reaction_type);

        Ok(ReactionView {
            summary: ReactionSummary::from_entries(&entries),
            my_reaction,
        })
    }

    /// Adding across a block is refused; toggling one's own entry off is not
    async fn check_block(
        &self,
        actor_id: &str,
        post_id: &str,
        kind: ReactionType,
    ) -> Result<(), AppError> {
        if !self.enforce_blocks {
            return Ok(());
        }

        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post".to_string()))?;

        match ensure_no_block(&self.db, actor_id, &post.author_id).await {
            Ok(()) => Ok(()),
            Err(error) => {
                let current = self.view(actor_id, post_id).await?.my_reaction;
                if current == Some(kind) {
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }
}
