use crate::{
    error::Result,
    models::{like::LikeView, user::UserSummary},
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

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/post/:post_id", post(like_post).delete(unlike_post))
        .route("/check/post/:post_id", get(has_user_liked))
        .route("/count/post/:post_id", get(get_like_count))
        .route("/users/post/:post_id", get(get_users_who_liked))
}

/// 点赞
/// POST /api/likes/post/:post_id
async fn like_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<LikeView>> {
    let like = state.like_service.like_post(user.id, post_id).await?;
    Ok(Json(like))
}

/// 取消点赞
/// DELETE /api/likes/post/:post_id
async fn unlike_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    state.like_service.unlike_post(user.id, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "liked": false
    })))
}

/// GET /api/likes/check/post/:post_id
async fn has_user_liked(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    let liked = state.like_service.has_user_liked(user.id, post_id).await?;
    Ok(Json(json!({ "liked": liked })))
}

/// GET /api/likes/count/post/:post_id
async fn get_like_count(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    let count = state.like_service.get_like_count(post_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// 获取点赞用户列表
/// GET /api/likes/users/post/:post_id
async fn get_users_who_liked(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<UserSummary>>> {
    let users = state.like_service.get_users_who_liked(post_id).await?;
    Ok(Json(users))
}
