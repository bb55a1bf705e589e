use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        chat::{Chat, ChatView, MessageView},
        user::UserSummary,
        websocket::UserQueue,
    },
    services::{websocket::PushDelivery, Database},
    utils::validation::validate_text,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

const SELECT_MESSAGE: &str = r#"
    SELECT m.id AS message_id, m.chat_id, m.content, m.sender_id,
           s.username AS sender_username, s.profile_picture AS sender_profile_picture,
           m.receiver_id, m.created_at, m.is_read
    FROM messages m
    JOIN users s ON s.id = m.sender_id
"#;

#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    push: Arc<dyn PushDelivery>,
    history_limit: i64,
    max_message_length: usize,
}

impl ChatService {
    pub async fn new(db: Arc<Database>, push: Arc<dyn PushDelivery>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            push,
            history_limit: config.chat_history_limit,
            max_message_length: config.max_message_length,
        })
    }

    /// 获取用户参与的所有会话（按最近活动排序）
    pub async fn get_user_chats(&self, user_id: i64) -> Result<Vec<ChatView>> {
        debug!("Getting chats for user {}", user_id);

        let chats: Vec<Chat> = sqlx::query_as(
            r#"
            SELECT * FROM chats
            WHERE user1_id = ? OR user2_id = ?
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut views = Vec::with_capacity(chats.len());
        for chat in &chats {
            views.push(self.to_view(chat, user_id, false).await?);
        }
        Ok(views)
    }

    pub async fn get_chat_by_id(&self, chat_id: i64, user_id: i64) -> Result<ChatView> {
        let chat = self.load_chat(chat_id).await?;
        if !chat.has_participant(user_id) {
            return Err(AppError::forbidden("You don't have access to this chat"));
        }
        self.to_view(&chat, user_id, true).await
    }

    pub async fn get_or_create_chat(&self, user_id: i64, other_user_id: i64) -> Result<ChatView> {
        let chat = self.find_or_create_chat(user_id, other_user_id).await?;
        self.to_view(&chat, user_id, true).await
    }

    /// Persists the message and bumps the chat's activity time together, then
    /// pushes the message to the receiver. The push is best effort.
    pub async fn send_message(&self, sender_id: i64, receiver_id: i64, content: &str) -> Result<MessageView> {
        debug!("User {} sending message to user {}", sender_id, receiver_id);
        validate_text("Message", content, self.max_message_length)?;

        let chat = self.find_or_create_chat(sender_id, receiver_id).await?;
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;

        let (message_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (chat_id, sender_id, receiver_id, content, created_at, is_read)
            VALUES (?, ?, ?, ?, ?, 0)
            RETURNING id
            "#,
        )
        .bind(chat.id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(chat.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let message = self.load_message(message_id).await?;
        info!("Message {} sent in chat {}", message_id, chat.id);

        let accepted = self.push.send_to_user(
            receiver_id,
            UserQueue::Messages.destination(),
            serde_json::to_value(&message)?,
        );
        debug!("Message {} reached {} live subscriptions", message_id, accepted);

        Ok(message)
    }

    /// Returns how many messages were flipped to read. The other participant
    /// receives a read receipt only when something changed.
    pub async fn mark_messages_as_read(&self, chat_id: i64, user_id: i64) -> Result<u64> {
        let chat = self.load_chat(chat_id).await?;
        if !chat.has_participant(user_id) {
            return Err(AppError::forbidden("You don't have access to this chat"));
        }

        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE chat_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        let flipped = result.rows_affected();
        if flipped > 0 {
            debug!("User {} read {} messages in chat {}", user_id, flipped, chat_id);
            self.push.send_to_user(
                chat.other_participant(user_id),
                UserQueue::ReadReceipts.destination(),
                json!({ "chatId": chat_id, "readerId": user_id }),
            );
        }

        Ok(flipped)
    }

    pub async fn get_unread_message_count(&self, user_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = 0")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn find_or_create_chat(&self, user_id: i64, other_user_id: i64) -> Result<Chat> {
        if user_id == other_user_id {
            return Err(AppError::bad_request("Cannot create chat with yourself"));
        }
        self.load_summary(user_id).await?;
        self.load_summary(other_user_id).await?;

        if let Some(chat) = self.find_chat(user_id, other_user_id).await? {
            return Ok(chat);
        }

        let now = Utc::now();
        let created: Option<Chat> = sqlx::query_as(
            r#"
            INSERT INTO chats (user1_id, user2_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .bind(now)
        .bind(now)
        .fetch_optional(self.db.pool())
        .await?;

        match created {
            Some(chat) => {
                info!("Created chat {} between users {} and {}", chat.id, user_id, other_user_id);
                Ok(chat)
            }
            // lost the race to a concurrent creator
            None => self
                .find_chat(user_id, other_user_id)
                .await?
                .ok_or_else(|| AppError::not_found("Chat")),
        }
    }

    async fn find_chat(&self, user_id: i64, other_user_id: i64) -> Result<Option<Chat>> {
        let chat = sqlx::query_as(
            r#"
            SELECT * FROM chats
            WHERE (user1_id = ? AND user2_id = ?) OR (user1_id = ? AND user2_id = ?)
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .bind(other_user_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(chat)
    }

    async fn load_chat(&self, chat_id: i64) -> Result<Chat> {
        sqlx::query_as("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))
    }

    async fn load_summary(&self, user_id: i64) -> Result<UserSummary> {
        sqlx::query_as("SELECT id AS user_id, username, profile_picture, name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn load_message(&self, message_id: i64) -> Result<MessageView> {
        let sql = format!("{} WHERE m.id = ?", SELECT_MESSAGE);
        sqlx::query_as(&sql)
            .bind(message_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Message"))
    }

    async fn to_view(&self, chat: &Chat, viewer_id: i64, with_messages: bool) -> Result<ChatView> {
        let other_user = self.load_summary(chat.other_participant(viewer_id)).await?;

        let sql = format!(
            "{} WHERE m.chat_id = ? ORDER BY m.created_at DESC, m.id DESC LIMIT ?",
            SELECT_MESSAGE
        );
        let limit = if with_messages { self.history_limit } else { 1 };
        let messages: Vec<MessageView> = sqlx::query_as(&sql)
            .bind(chat.id)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        let (has_unread,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE chat_id = ? AND receiver_id = ? AND is_read = 0)",
        )
        .bind(chat.id)
        .bind(viewer_id)
        .fetch_one(self.db.pool())
        .await?;

        let last = messages.first();
        Ok(ChatView {
            chat_id: chat.id,
            other_user,
            last_message_time: last.map(|m| m.created_at),
            last_message_content: last.map(|m| m.content.clone()),
            last_message_sender_id: last.map(|m| m.sender_id),
            has_unread_messages: has_unread,
            recent_messages: with_messages.then_some(messages),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::websocket::MockPushDelivery;

    async fn setup(push: MockPushDelivery) -> ChatService {
        let db = Arc::new(Database::in_memory().await.unwrap());
        for name in ["alice", "bob", "carol"] {
            sqlx::query("INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, 'x', ?)")
                .bind(name)
                .bind(format!("{}@example.com", name))
                .bind(Utc::now())
                .execute(db.pool())
                .await
                .unwrap();
        }
        ChatService::new(db, Arc::new(push), &Config::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_with_self_is_rejected() {
        let service = setup(MockPushDelivery::new()).await;
        assert!(matches!(
            service.get_or_create_chat(1, 1).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_create_chat_reuses_pair() {
        let service = setup(MockPushDelivery::new()).await;

        let first = service.get_or_create_chat(1, 2).await.unwrap();
        let second = service.get_or_create_chat(2, 1).await.unwrap();

        assert_eq!(first.chat_id, second.chat_id);
        assert_eq!(first.other_user.username, "bob");
        assert_eq!(second.other_user.username, "alice");
        assert_eq!(first.recent_messages.map(|m| m.len()), Some(0));
    }

    #[tokio::test]
    async fn test_send_and_read_round() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user()
            .withf(|user_id, destination, payload| {
                *user_id == 2 && destination == "/queue/messages" && payload["content"] == "yo"
            })
            .times(1)
            .return_const(1usize);
        push.expect_send_to_user()
            .withf(|user_id, destination, _| *user_id == 1 && destination == "/queue/read-receipts")
            .times(1)
            .return_const(1usize);
        let service = setup(push).await;

        let message = service.send_message(1, 2, "yo").await.unwrap();
        assert!(!message.is_read);
        assert_eq!(service.get_unread_message_count(2).await.unwrap(), 1);

        let chats = service.get_user_chats(2).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert!(chats[0].has_unread_messages);
        assert!(chats[0].recent_messages.is_none());

        assert_eq!(service.mark_messages_as_read(message.chat_id, 2).await.unwrap(), 1);
        assert_eq!(service.get_unread_message_count(2).await.unwrap(), 0);

        // nothing left to flip, so no second receipt
        assert_eq!(service.mark_messages_as_read(message.chat_id, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_chat() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().return_const(0usize);
        let service = setup(push).await;

        let message = service.send_message(1, 2, "private").await.unwrap();

        assert!(matches!(
            service.get_chat_by_id(message.chat_id, 3).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            service.mark_messages_as_read(message.chat_id, 3).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(service.get_chat_by_id(999, 1).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let service = setup(MockPushDelivery::new()).await;
        assert!(service.send_message(1, 2, "   ").await.is_err());
        assert_eq!(service.get_unread_message_count(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chats_ordered_by_latest_activity() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().return_const(0usize);
        let service = setup(push).await;

        service.send_message(2, 1, "from bob").await.unwrap();
        service.send_message(3, 1, "from carol").await.unwrap();

        let chats = service.get_user_chats(1).await.unwrap();
        let names: Vec<&str> = chats.iter().map(|c| c.other_user.username.as_str()).collect();
        assert_eq!(names, vec!["carol", "bob"]);
        assert_eq!(chats[0].last_message_content.as_deref(), Some("from carol"));
        assert_eq!(chats[0].last_message_sender_id, Some(3));
    }
}
