//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services validate preconditions, run the storage mutation, and fan out
//! notifications as a best-effort side effect.

mod interaction;
mod notification;
mod reaction;
mod relationship;

pub use interaction::{ContentView, InteractionService, StoryLikeState};
pub use notification::{
    NotificationEvent, NotificationPage, NotificationService, NotificationSink, fan_out,
};
pub use reaction::{ReactionService, ReactionView};
pub use relationship::RelationshipService;

#[cfg(test)]
pub use notification::MockNotificationSink;

use serde::Serialize;

use crate::config::PaginationConfig;
use crate::data::Database;
use crate::error::AppError;

/// Normalized page request (1-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp client input against the configured page sizes
    ///
    /// Missing or zero values fall back to page 1 and the default size.
    pub fn new(page: Option<u32>, limit: Option<u32>, config: &PaginationConfig) -> Self {
        let page = page.filter(|page| *page > 0).unwrap_or(1);
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);

        Self { page, limit }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Pagination block returned with every listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next: bool,
    pub limit: u32,
}

impl Pagination {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let limit = request.limit();
        Self {
            current_page: request.page,
            total_pages: (total_count + limit - 1) / limit,
            total_count,
            has_next: i64::from(request.page) * limit < total_count,
            limit: request.limit,
        }
    }
}

/// Refuse content interactions across a block edge in either direction
async fn ensure_no_block(db: &Database, actor_id: &str, author_id: &str) -> Result<(), AppError> {
    if actor_id == author_id {
        return Ok(());
    }

    let pair = db.get_pair_state(actor_id, author_id).await?;
    if pair.has_block() {
        tracing::debug!(actor = %actor_id, target = %author_id, "Interaction refused across block");
        return Err(AppError::Forbidden(
            "Content is not available to this user".to_string(),
        ));
    }

    Ok(())
}
