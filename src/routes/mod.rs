pub mod auth;
pub mod chats;
pub mod comments;
pub mod follows;
pub mod likes;
pub mod notifications;
pub mod posts;
pub mod users;
pub mod websocket;
