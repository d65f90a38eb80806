//! Friend request, follow and block endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use crate::AppState;
use crate::api::converters::{mutation_to_response, relationship_to_response};
use crate::api::dto::*;
use crate::auth::CurrentUser;
use crate::data::UserSummary;
use crate::error::AppError;

/// POST /api/friend-requests/:receiver_id
pub async fn send_friend_request(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(receiver_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state
        .relationships
        .send_request(&session.user_id, &receiver_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// DELETE /api/friend-requests/:receiver_id
pub async fn cancel_friend_request(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(receiver_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state
        .relationships
        .cancel_request(&session.user_id, &receiver_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// POST /api/friend-requests/:sender_id/accept
pub async fn accept_friend_request(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(sender_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state
        .relationships
        .accept_request(&session.user_id, &sender_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// POST /api/friend-requests/:sender_id/reject
pub async fn reject_friend_request(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(sender_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state
        .relationships
        .reject_request(&session.user_id, &sender_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// GET /api/friend-requests
pub async fn list_friend_requests(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<UserSummary>>, AppError> {
    let request = params.page_request(&state.config.pagination);
    let (data, pagination) = state
        .relationships
        .incoming_requests(&session.user_id, request)
        .await?;
    Ok(Json(PageResponse { data, pagination }))
}

/// GET /api/friends
pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UserListResponse>, AppError> {
    let data = state.relationships.friends(&session.user_id).await?;
    Ok(Json(UserListResponse { data }))
}

/// GET /api/blocked-users
pub async fn list_blocked_users(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UserListResponse>, AppError> {
    let data = state.relationships.blocked_users(&session.user_id).await?;
    Ok(Json(UserListResponse { data }))
}

/// GET /api/relationships/:user_id
pub async fn get_relationship(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipViewResponse>, AppError> {
    let snapshot = state
        .relationships
        .relationship(&session.user_id, &user_id)
        .await?;
    Ok(Json(RelationshipViewResponse {
        relationship: relationship_to_response(&snapshot),
        counts: snapshot.counts,
    }))
}

/// PUT /api/relationships/:user_id/follow
pub async fn toggle_follow(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let (_following, snapshot) = state
        .relationships
        .toggle_follow(&session.user_id, &user_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// POST /api/relationships/:user_id/block
pub async fn block_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state.relationships.block(&session.user_id, &user_id).await?;
    Ok(Json(mutation_to_response(&snapshot)))
}

/// POST /api/relationships/:user_id/unblock
pub async fn unblock_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipMutationResponse>, AppError> {
    let snapshot = state
        .relationships
        .unblock(&session.user_id, &user_id)
        .await?;
    Ok(Json(mutation_to_response(&snapshot)))
}
