use crate::{
    error::Result,
    models::user::{
        SearchQuery, UpdateBioRequest, UpdateProfileImageRequest, UpdateProfileRequest, User, UserSummary,
    },
    services::auth::AuthUser,
    state::AppState,
    utils::image::ImagePayload,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/by-username/:username", get(get_user_by_username))
        .route("/search", get(search_users))
        .route("/followers", get(get_followers_for_tagging))
        .route("/bio", put(update_bio))
        .route("/profile", put(update_profile))
        .route("/profile-image", put(update_profile_image))
}

/// 获取当前用户信息
/// GET /api/users/me
async fn get_current_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<User>> {
    debug!("Getting current user info for user: {}", user.id);
    let current = state.user_service.get_current_user(user.id).await?;
    Ok(Json(current))
}

/// 根据用户名获取用户
/// GET /api/users/by-username/:username
async fn get_user_by_username(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<User>> {
    let found = state.user_service.find_by_username(&username).await?;
    Ok(Json(found))
}

/// 搜索用户
/// GET /api/users/search?query=
async fn search_users(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>> {
    let users = state.user_service.search_users(&query.query).await?;
    Ok(Json(users))
}

/// 获取可标记的关注者
/// GET /api/users/followers
async fn get_followers_for_tagging(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>> {
    let users = state.user_service.get_followers_for_tagging(user.id).await?;
    Ok(Json(users))
}

/// 更新个人简介
/// PUT /api/users/bio
async fn update_bio(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateBioRequest>,
) -> Result<Json<User>> {
    let updated = state.user_service.update_bio(user.id, &request.bio).await?;
    Ok(Json(updated))
}

/// 更新个人资料
/// PUT /api/users/profile
async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let updated = state.user_service.update_profile(user.id, request).await?;
    Ok(Json(updated))
}

/// 更新头像
/// PUT /api/users/profile-image
async fn update_profile_image(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileImageRequest>,
) -> Result<Json<User>> {
    let image = ImagePayload::classify(&request.image);
    let updated = state.user_service.update_profile_image(user.id, &image).await?;
    Ok(Json(updated))
}
