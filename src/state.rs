use crate::{
    config::Config,
    error::Result,
    services::{
        AuthService, ChatService, CommentService, Database, FileStorage, FollowService, LikeService,
        LocalFileStorage, NotificationService, PostService, PushDelivery, UserService, WebSocketHub,
    },
    utils::middleware::{build_rate_limiter, KeyedRateLimiter},
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 在线 WebSocket 连接
    pub hub: Arc<WebSocketHub>,

    /// 认证接口的速率限制
    pub rate_limiter: Arc<KeyedRateLimiter>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 帖子服务
    pub post_service: PostService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 点赞服务
    pub like_service: LikeService,

    /// 关注服务
    pub follow_service: FollowService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 私信服务
    pub chat_service: ChatService,
}

impl AppState {
    /// Production wiring: pushes go through the hub, images to the upload dir.
    pub async fn new(config: Config, db: Arc<Database>) -> Result<Self> {
        let hub = Arc::new(WebSocketHub::new());
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(&config)?);
        let push: Arc<dyn PushDelivery> = hub.clone();
        Self::with_collaborators(config, db, hub, push, storage).await
    }

    /// Lets callers swap the push channel and file storage, e.g. for a
    /// recording fake in tests.
    pub async fn with_collaborators(
        config: Config,
        db: Arc<Database>,
        hub: Arc<WebSocketHub>,
        push: Arc<dyn PushDelivery>,
        storage: Arc<dyn FileStorage>,
    ) -> Result<Self> {
        let notification_service = NotificationService::new(db.clone(), push.clone(), &config).await?;

        let auth_service = AuthService::new(db.clone(), &config).await?;
        let user_service = UserService::new(db.clone(), storage.clone(), &config).await?;
        let post_service = PostService::new(db.clone(), storage).await?;
        let comment_service =
            CommentService::new(db.clone(), notification_service.clone(), &config).await?;
        let like_service = LikeService::new(db.clone(), notification_service.clone()).await?;
        let follow_service = FollowService::new(db.clone(), notification_service.clone()).await?;
        let chat_service = ChatService::new(db.clone(), push, &config).await?;

        Ok(Self {
            rate_limiter: Arc::new(build_rate_limiter(config.rate_limit_requests)),
            config,
            db,
            hub,
            auth_service,
            user_service,
            post_service,
            comment_service,
            like_service,
            follow_service,
            notification_service,
            chat_service,
        })
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}
