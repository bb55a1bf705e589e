use serde::Serialize;

/// Prefix for client-to-server application destinations
pub const APP_PREFIX: &str = "/app";

/// Prefix under which a session subscribes to its own queues
pub const USER_PREFIX: &str = "/user";

/// Destinations a client may SUBSCRIBE to
pub const BROKER_PREFIXES: [&str; 4] = ["/user/", "/topic/", "/queue/", "/notifications"];

/// Per-user delivery queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserQueue {
    Messages,            // /queue/messages
    ReadReceipts,        // /queue/read-receipts
    Notifications,       // /queue/notifications
    NotificationCount,   // /queue/notifications/count
    Errors,              // /queue/errors
}

impl UserQueue {
    /// 服务端推送时使用的目的地
    pub fn destination(&self) -> &'static str {
        match self {
            UserQueue::Messages => "/queue/messages",
            UserQueue::ReadReceipts => "/queue/read-receipts",
            UserQueue::Notifications => "/queue/notifications",
            UserQueue::NotificationCount => "/queue/notifications/count",
            UserQueue::Errors => "/queue/errors",
        }
    }
}

/// Maps a server-side user destination to what the client subscribed to,
/// e.g. `/queue/messages` becomes `/user/queue/messages`.
pub fn user_destination(destination: &str) -> String {
    format!("{}{}", USER_PREFIX, destination)
}

pub fn is_broker_destination(destination: &str) -> bool {
    BROKER_PREFIXES
        .iter()
        .any(|prefix| destination.starts_with(prefix))
}

/// Destinations relayed verbatim to every subscriber
pub fn is_broadcast_destination(destination: &str) -> bool {
    destination.starts_with("/topic/") || destination.starts_with("/notifications")
}

/// 客户端发往 /app 的消息处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppDestination {
    SendMessage,
    MarkRead,
}

impl AppDestination {
    pub fn parse(destination: &str) -> Option<Self> {
        match destination.strip_prefix(APP_PREFIX)? {
            "/chat.sendMessage" => Some(AppDestination::SendMessage),
            "/chat.markRead" => Some(AppDestination::MarkRead),
            _ => None,
        }
    }
}

/// Body pushed to `/queue/errors` when an application handler fails
#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub destination: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_destination() {
        assert_eq!(
            user_destination(UserQueue::Messages.destination()),
            "/user/queue/messages"
        );
        assert_eq!(
            user_destination(UserQueue::NotificationCount.destination()),
            "/user/queue/notifications/count"
        );
    }

    #[test]
    fn test_destination_classes() {
        assert!(is_broker_destination("/user/queue/read-receipts"));
        assert!(is_broker_destination("/topic/public"));
        assert!(is_broker_destination("/notifications"));
        assert!(!is_broker_destination("/app/chat.sendMessage"));
        assert!(!is_broker_destination("/admin"));

        assert!(is_broadcast_destination("/topic/public"));
        assert!(!is_broadcast_destination("/user/queue/messages"));
    }

    #[test]
    fn test_app_destination_parse() {
        assert_eq!(
            AppDestination::parse("/app/chat.sendMessage"),
            Some(AppDestination::SendMessage)
        );
        assert_eq!(AppDestination::parse("/app/chat.markRead"), Some(AppDestination::MarkRead));
        assert_eq!(AppDestination::parse("/app/chat.delete"), None);
        assert_eq!(AppDestination::parse("/chat.markRead"), None);
    }
}
