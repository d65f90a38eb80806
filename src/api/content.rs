//! Content, reaction, comment, share and story endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::AppState;
use crate::api::converters::comment_to_response;
use crate::api::dto::*;
use crate::api::extract::ApiJson;
use crate::auth::CurrentUser;
use crate::data::{ReactionType, Reactor};
use crate::error::AppError;
use crate::service::{ContentView, ReactionView, StoryLikeState};

/// POST /api/content
pub async fn create_content(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<(StatusCode, Json<ContentCreatedResponse>), AppError> {
    let post = state.interactions.create_post(&session.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContentCreatedResponse {
            id: post.id,
            author_id: post.author_id,
            created_at: post.created_at,
        }),
    ))
}

/// GET /api/content/:id
pub async fn get_content(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ContentView>, AppError> {
    let view = state.interactions.content(&session.user_id, &id).await?;
    Ok(Json(view))
}

/// PUT /api/content/:id/reaction
pub async fn set_reaction(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReactionRequest>,
) -> Result<Json<ReactionView>, AppError> {
    let desired = req
        .reaction_type
        .as_deref()
        .map(str::parse::<ReactionType>)
        .transpose()
        .map_err(AppError::Validation)?;

    let view = state
        .reactions
        .set_reaction(&session.user_id, &id, desired)
        .await?;
    Ok(Json(view))
}

/// GET /api/content/:id/reactions
pub async fn list_reactions(
    State(state): State<AppState>,
    CurrentUser(_session): CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<Reactor>>, AppError> {
    let request = params.page_request(&state.config.pagination);
    let (data, pagination) = state.interactions.reactors(&id, request).await?;
    Ok(Json(PageResponse { data, pagination }))
}

/// POST /api/content/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = state
        .interactions
        .add_comment(&session.user_id, &id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment_to_response(comment))))
}

/// POST /api/content/:id/share
pub async fn share_content(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>, AppError> {
    let share_count = state.interactions.share(&session.user_id, &id).await?;
    Ok(Json(ShareResponse { share_count }))
}

/// POST /api/stories
pub async fn create_story(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<(StatusCode, Json<ContentCreatedResponse>), AppError> {
    let story = state.interactions.create_story(&session.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContentCreatedResponse {
            id: story.id,
            author_id: story.author_id,
            created_at: story.created_at,
        }),
    ))
}

/// PUT /api/stories/:id/like
pub async fn toggle_story_like(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<StoryLikeState>, AppError> {
    let like = state
        .interactions
        .toggle_story_like(&session.user_id, &id)
        .await?;
    Ok(Json(like))
}
