pub mod auth;
pub mod chat;
pub mod comment;
pub mod database;
pub mod follow;
pub mod like;
pub mod notification;
pub mod post;
pub mod storage;
pub mod user;
pub mod websocket;

// 重新导出常用类型
pub use auth::AuthService;
pub use chat::ChatService;
pub use comment::CommentService;
pub use database::Database;
pub use follow::FollowService;
pub use like::LikeService;
pub use notification::NotificationService;
pub use post::PostService;
pub use storage::{FileStorage, LocalFileStorage};
pub use user::UserService;
pub use websocket::{PushDelivery, WebSocketHub};
