use crate::{
    error::{AppError, Result},
    models::user::{AuthenticationResponse, LoginRequest, RegisterRequest},
    services::auth::AuthUser,
    state::AppState,
    utils::middleware::{bearer_token, rate_limit_middleware},
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

/// 用户注册
/// POST /auth/register
pub async fn register(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthenticationResponse>)> {
    debug!("Registration attempt for username: {}", request.username);

    let response = app_state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// 用户登录
/// POST /auth/login
pub async fn login(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthenticationResponse>> {
    debug!("Login attempt for username: {}", request.username);

    let response = app_state.auth_service.login(request).await?;
    Ok(Json(response))
}

/// 注销当前令牌
/// POST /auth/logout
pub async fn logout(
    State(app_state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

    app_state.auth_service.logout(token).await?;
    info!("User {} logged out", user.username);

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}
