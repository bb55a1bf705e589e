use crate::{
    error::Result,
    models::post::{CreatePostRequest, PostView, SavedPostView},
    services::auth::AuthUser,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_post).get(get_all_posts))
        .route("/feed", get(get_news_feed))
        .route("/saved", get(get_saved_posts))
        .route("/user/:username", get(get_user_posts))
        .route("/:post_id", get(get_post))
        .route("/:post_id/save", post(save_post).delete(unsave_post))
        .route("/:post_id/saved", get(is_post_saved))
}

/// 发布帖子
/// POST /api/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostView>)> {
    debug!("Creating post for user: {}", user.id);
    let post = state.post_service.create_post(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// 获取所有帖子
/// GET /api/posts
async fn get_all_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PostView>>> {
    let posts = state.post_service.get_all_posts().await?;
    Ok(Json(posts))
}

/// 获取动态
/// GET /api/posts/feed
async fn get_news_feed(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Vec<PostView>>> {
    let posts = match user {
        Some(user) => state.post_service.get_news_feed(user.id).await?,
        None => state.post_service.get_all_posts().await?,
    };
    Ok(Json(posts))
}

/// 获取指定用户的帖子
/// GET /api/posts/user/:username
async fn get_user_posts(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Vec<PostView>>> {
    let posts = state.post_service.get_user_posts(&username).await?;
    Ok(Json(posts))
}

/// 获取帖子详情
/// GET /api/posts/:post_id
async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostView>> {
    let post = state.post_service.get_post(post_id).await?;
    Ok(Json(post))
}

/// 收藏帖子
/// POST /api/posts/:post_id/save
async fn save_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    state.post_service.save_post(user.id, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "saved": true
    })))
}

/// 取消收藏
/// DELETE /api/posts/:post_id/save
async fn unsave_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    state.post_service.unsave_post(user.id, post_id).await?;

    Ok(Json(json!({
        "success": true,
        "saved": false
    })))
}

/// 检查是否已收藏
/// GET /api/posts/:post_id/saved
async fn is_post_saved(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    let saved = state.post_service.is_post_saved(user.id, post_id).await?;
    Ok(Json(json!({ "saved": saved })))
}

/// 获取收藏列表
/// GET /api/posts/saved
async fn get_saved_posts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<SavedPostView>>> {
    let posts = state.post_service.get_saved_posts(user.id).await?;
    Ok(Json(posts))
}
