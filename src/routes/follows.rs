use crate::{
    error::Result,
    models::{
        follow::{FollowOutcome, FollowProfile},
        user::UserSummary,
    },
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
        .route("/:user_id", post(follow_user).delete(unfollow_user))
        .route("/check/:user_id", get(check_following))
        .route("/user/:user_id", get(get_follow_profile))
        .route("/followers/count/:user_id", get(get_followers_count))
        .route("/following/count/:user_id", get(get_following_count))
        .route("/posts/count/:user_id", get(get_posts_count))
        .route("/followers/:user_id", get(get_followers))
        .route("/following/:user_id", get(get_following))
}

/// 关注用户（再次调用则取消关注）
/// POST /api/follows/:user_id
async fn follow_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    debug!("User {} toggling follow on user {}", user.id, user_id);

    let outcome = state.follow_service.follow_user(user.id, user_id).await?;
    let body = match outcome {
        FollowOutcome::Followed(follow) => json!({
            "following": true,
            "follow": follow,
            "message": "User followed successfully"
        }),
        FollowOutcome::Unfollowed => json!({
            "following": false,
            "message": "User unfollowed successfully"
        }),
    };

    Ok(Json(body))
}

/// 取消关注用户
/// DELETE /api/follows/:user_id
async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    debug!("User {} unfollowing user {}", user.id, user_id);
    state.follow_service.unfollow_user(user.id, user_id).await?;

    Ok(Json(json!({
        "following": false,
        "message": "User unfollowed successfully"
    })))
}

/// 检查是否关注某用户
/// GET /api/follows/check/:user_id
async fn check_following(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let following = state.follow_service.is_following(user.id, user_id).await?;
    Ok(Json(json!({ "following": following })))
}

/// GET /api/follows/user/:user_id
async fn get_follow_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<FollowProfile>> {
    let profile = state.follow_service.get_follow_profile(user_id, user.id).await?;
    Ok(Json(profile))
}

/// GET /api/follows/followers/count/:user_id
async fn get_followers_count(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let count = state.follow_service.get_followers_count(user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/follows/following/count/:user_id
async fn get_following_count(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let count = state.follow_service.get_following_count(user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// GET /api/follows/posts/count/:user_id
async fn get_posts_count(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let count = state.follow_service.get_posts_count(user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// 获取用户的关注者列表
/// GET /api/follows/followers/:user_id
async fn get_followers(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<UserSummary>>> {
    let followers = state.follow_service.get_followers(user_id).await?;
    Ok(Json(followers))
}

/// 获取用户关注的人列表
/// GET /api/follows/following/:user_id
async fn get_following(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<UserSummary>>> {
    let following = state.follow_service.get_following(user_id).await?;
    Ok(Json(following))
}
