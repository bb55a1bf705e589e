use crate::{
    error::Result,
    models::notification::NotificationView,
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread", get(get_unread_notifications))
        .route("/count", get(get_unread_count))
        .route("/:notification_id/read", put(mark_as_read))
        .route("/:notification_id", delete(delete_notification))
}

/// 获取通知列表
/// GET /api/notifications
async fn get_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<NotificationView>>> {
    debug!("Getting notifications for user: {}", user.id);
    let notifications = state
        .notification_service
        .get_notifications_for_user(&user.username)
        .await?;
    Ok(Json(notifications))
}

/// 获取未读通知
/// GET /api/notifications/unread
async fn get_unread_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<NotificationView>>> {
    let notifications = state
        .notification_service
        .get_unread_notifications_for_user(&user.username)
        .await?;
    Ok(Json(notifications))
}

/// 获取未读通知数量
/// GET /api/notifications/count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let count = state
        .notification_service
        .get_unread_notification_count(&user.username)
        .await?;
    Ok(Json(json!({ "unreadCount": count })))
}

/// 标记通知为已读
/// PUT /api/notifications/:notification_id/read
async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<NotificationView>> {
    let notification = state
        .notification_service
        .mark_as_read(notification_id, user.id)
        .await?;
    Ok(Json(notification))
}

/// 删除通知
/// DELETE /api/notifications/:notification_id
async fn delete_notification(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>> {
    state
        .notification_service
        .delete_notification(notification_id, user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notification deleted successfully"
    })))
}
