//! Notification endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use crate::AppState;
use crate::api::converters::{bare_notification_to_response, notification_to_response};
use crate::api::dto::*;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// GET /api/notifications
pub async fn get_notifications(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<NotificationResponse>>, AppError> {
    let request = params.page_request(&state.config.pagination);
    let page = state
        .notifications
        .list(&session.user_id, request)
        .await?;

    Ok(Json(PageResponse {
        data: page.data.iter().map(notification_to_response).collect(),
        pagination: page.pagination,
    }))
}

/// PATCH /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let notification = state
        .notifications
        .mark_read(&id, &session.user_id)
        .await?;

    Ok(Json(MarkReadResponse {
        status: true,
        notification: bare_notification_to_response(&notification),
    }))
}

/// PATCH /api/notifications/mark-all-read
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.notifications.mark_all_read(&session.user_id).await?;
    Ok(Json(MarkAllReadResponse {
        status: true,
        updated,
    }))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread_count = state.notifications.unread_count(&session.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
