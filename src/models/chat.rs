use super::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

/// Message joined with its sender
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub message_id: i64,
    pub chat_id: i64,
    pub content: String,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_profile_picture: Option<String>,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub chat_id: i64,
    pub other_user: UserSummary,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<i64>,
    pub has_unread_messages: bool,
    /// Newest first; only filled in when a single chat is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_messages: Option<Vec<MessageView>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub chat_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants() {
        let now = Utc::now();
        let chat = Chat {
            id: 1,
            user1_id: 10,
            user2_id: 20,
            created_at: now,
            updated_at: now,
        };
        assert!(chat.has_participant(10));
        assert!(chat.has_participant(20));
        assert!(!chat.has_participant(30));
        assert_eq!(chat.other_participant(10), 20);
        assert_eq!(chat.other_participant(20), 10);
    }
}
