use crate::{
    error::Result,
    models::chat::{ChatView, MessageView, SendMessageRequest},
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_user_chats))
        .route("/unread/count", get(get_unread_count))
        .route("/message", post(send_message))
        .route("/with/:other_user_id", post(get_or_create_chat))
        .route("/:chat_id", get(get_chat))
        .route("/:chat_id/read", post(mark_as_read))
}

/// 获取会话列表
/// GET /api/chats
async fn get_user_chats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<ChatView>>> {
    let chats = state.chat_service.get_user_chats(user.id).await?;
    Ok(Json(chats))
}

/// 获取会话详情
/// GET /api/chats/:chat_id
async fn get_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<ChatView>> {
    let chat = state.chat_service.get_chat_by_id(chat_id, user.id).await?;
    Ok(Json(chat))
}

/// 获取或创建与某用户的会话
/// POST /api/chats/with/:other_user_id
async fn get_or_create_chat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(other_user_id): Path<i64>,
) -> Result<Json<ChatView>> {
    let chat = state
        .chat_service
        .get_or_create_chat(user.id, other_user_id)
        .await?;
    Ok(Json(chat))
}

/// 发送私信
/// POST /api/chats/message
async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageView>> {
    debug!("User {} sending message to {}", user.id, request.receiver_id);
    let message = state
        .chat_service
        .send_message(user.id, request.receiver_id, &request.content)
        .await?;
    Ok(Json(message))
}

/// 标记会话已读
/// POST /api/chats/:chat_id/read
async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Value>> {
    let marked = state.chat_service.mark_messages_as_read(chat_id, user.id).await?;

    Ok(Json(json!({
        "success": true,
        "markedRead": marked
    })))
}

/// GET /api/chats/unread/count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let count = state.chat_service.get_unread_message_count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}
