use crate::{
    error::Result,
    models::comment::{CommentView, CreateCommentRequest},
    services::auth::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/post/:post_id", post(create_comment).get(get_post_comments))
        .route("/:comment_id", delete(delete_comment))
        .route("/countFromPost/:post_id", get(count_comments))
}

/// 发表评论
/// POST /api/comments/post/:post_id
async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>)> {
    debug!("User {} commenting on post {}", user.id, post_id);
    let comment = state
        .comment_service
        .create_comment(user.id, post_id, &request.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// 获取帖子评论
/// GET /api/comments/post/:post_id
async fn get_post_comments(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentView>>> {
    let comments = state.comment_service.get_post_comments(post_id).await?;
    Ok(Json(comments))
}

/// 删除评论
/// DELETE /api/comments/:comment_id
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    state.comment_service.delete_comment(user.id, comment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Comment deleted successfully"
    })))
}

/// 评论数
/// GET /api/comments/countFromPost/:post_id
async fn count_comments(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    let count = state.comment_service.count_comments(post_id).await?;
    Ok(Json(json!({ "count": count })))
}
