use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        notification::{NotificationRow, NotificationType, NotificationView},
        user::User,
        websocket::UserQueue,
    },
    services::{websocket::PushDelivery, Database},
    utils::validation::truncate_with_ellipsis,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SELECT_NOTIFICATION: &str = r#"
    SELECT n.id, n.notification_type, n.message,
           n.from_user_id, f.username AS from_username,
           f.profile_picture AS from_user_profile_picture,
           n.to_user_id, n.post_id, p.image_urls AS post_image_urls,
           n.created_at, n.is_read, n.read_at, n.delivered, n.delivered_at
    FROM notifications n
    JOIN users f ON f.id = n.from_user_id
    LEFT JOIN posts p ON p.id = n.post_id
"#;

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
    push: Arc<dyn PushDelivery>,
    preview_length: usize,
}

impl NotificationService {
    pub async fn new(db: Arc<Database>, push: Arc<dyn PushDelivery>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            push,
            preview_length: config.notification_preview_length,
        })
    }

    /// Records the notification and pushes it to the recipient. A user acting
    /// on their own content gets nothing: `Ok(None)`, no row, no push.
    pub async fn create_notification(
        &self,
        notification_type: NotificationType,
        message: &str,
        from_user_id: i64,
        to_user_id: i64,
        post_id: Option<i64>,
    ) -> Result<Option<NotificationView>> {
        if from_user_id == to_user_id {
            debug!("Suppressing {} notification to self for user {}", notification_type, from_user_id);
            return Ok(None);
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO notifications
                (notification_type, message, from_user_id, to_user_id, post_id, created_at, is_read, delivered)
            VALUES (?, ?, ?, ?, ?, ?, 0, 0)
            RETURNING id
            "#,
        )
        .bind(notification_type.as_str())
        .bind(message)
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(post_id)
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        let mut view = self.fetch(id).await?;
        info!("Created {} notification {} for user {}", notification_type, id, to_user_id);

        let accepted = self.push.send_to_user(
            to_user_id,
            UserQueue::Notifications.destination(),
            serde_json::to_value(&view)?,
        );
        if accepted > 0 {
            let delivered_at = Utc::now();
            match sqlx::query("UPDATE notifications SET delivered = 1, delivered_at = ? WHERE id = ?")
                .bind(delivered_at)
                .bind(id)
                .execute(self.db.pool())
                .await
            {
                Ok(_) => {
                    view.delivered = true;
                    view.delivered_at = Some(delivered_at);
                }
                Err(e) => warn!("Failed to record delivery of notification {}: {}", id, e),
            }
        }

        Ok(Some(view))
    }

    pub async fn create_like_notification(
        &self,
        from: &User,
        to_user_id: i64,
        post_id: i64,
    ) -> Result<Option<NotificationView>> {
        let message = format!("{} liked your post", from.username);
        self.create_notification(NotificationType::Like, &message, from.id, to_user_id, Some(post_id))
            .await
    }

    pub async fn create_comment_notification(
        &self,
        from: &User,
        to_user_id: i64,
        post_id: i64,
        comment: &str,
    ) -> Result<Option<NotificationView>> {
        let message = format!(
            "{} commented on your post: {}",
            from.username,
            truncate_with_ellipsis(comment, self.preview_length)
        );
        self.create_notification(NotificationType::Comment, &message, from.id, to_user_id, Some(post_id))
            .await
    }

    pub async fn create_follow_notification(
        &self,
        from: &User,
        to_user_id: i64,
    ) -> Result<Option<NotificationView>> {
        let message = format!("{} started following you", from.username);
        self.create_notification(NotificationType::Follow, &message, from.id, to_user_id, None)
            .await
    }

    /// 获取用户的所有通知（最新优先）
    pub async fn get_notifications_for_user(&self, username: &str) -> Result<Vec<NotificationView>> {
        let user_id = self.resolve_user(username).await?;
        let sql = format!(
            "{} WHERE n.to_user_id = ? ORDER BY n.created_at DESC, n.id DESC",
            SELECT_NOTIFICATION
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(into_view).collect()
    }

    pub async fn get_unread_notifications_for_user(&self, username: &str) -> Result<Vec<NotificationView>> {
        let user_id = self.resolve_user(username).await?;
        let sql = format!(
            "{} WHERE n.to_user_id = ? AND n.is_read = 0 ORDER BY n.created_at DESC, n.id DESC",
            SELECT_NOTIFICATION
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(into_view).collect()
    }

    pub async fn get_unread_notification_count(&self, username: &str) -> Result<i64> {
        let user_id = self.resolve_user(username).await?;
        self.unread_count(user_id).await
    }

    /// Marks the notification read and pushes the new unread count. Already
    /// read notifications are returned untouched.
    pub async fn mark_as_read(&self, notification_id: i64, user_id: i64) -> Result<NotificationView> {
        debug!("User {} marking notification {} as read", user_id, notification_id);

        let view = self.fetch(notification_id).await?;
        if view.to_user_id != user_id {
            return Err(AppError::forbidden("You can only read your own notifications"));
        }
        if view.is_read {
            return Ok(view);
        }

        sqlx::query("UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ? AND is_read = 0")
            .bind(Utc::now())
            .bind(notification_id)
            .execute(self.db.pool())
            .await?;

        let unread = self.unread_count(user_id).await?;
        self.push.send_to_user(
            user_id,
            UserQueue::NotificationCount.destination(),
            json!({ "unreadCount": unread }),
        );

        self.fetch(notification_id).await
    }

    pub async fn delete_notification(&self, notification_id: i64, user_id: i64) -> Result<()> {
        let view = self.fetch(notification_id).await?;
        if view.to_user_id != user_id {
            return Err(AppError::forbidden("You can only delete your own notifications"));
        }

        sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(notification_id)
            .execute(self.db.pool())
            .await?;

        info!("Deleted notification {}", notification_id);
        Ok(())
    }

    async fn fetch(&self, notification_id: i64) -> Result<NotificationView> {
        let sql = format!("{} WHERE n.id = ?", SELECT_NOTIFICATION);
        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(notification_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))?;
        into_view(row)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE to_user_id = ? AND is_read = 0")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn resolve_user(&self, username: &str) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|(id,)| id)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
    }
}

fn into_view(row: NotificationRow) -> Result<NotificationView> {
    NotificationView::try_from(row).map_err(AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::websocket::MockPushDelivery;

    async fn setup(push: MockPushDelivery) -> (NotificationService, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        for name in ["alice", "bob"] {
            sqlx::query("INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, 'x', ?)")
                .bind(name)
                .bind(format!("{}@example.com", name))
                .bind(Utc::now())
                .execute(db.pool())
                .await
                .unwrap();
        }
        let service = NotificationService::new(db.clone(), Arc::new(push), &Config::default())
            .await
            .unwrap();
        (service, db)
    }

    async fn notification_rows(db: &Database) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(db.pool())
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_self_notification_is_suppressed() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().never();
        let (service, db) = setup(push).await;

        let created = service
            .create_notification(NotificationType::Like, "alice liked your post", 1, 1, None)
            .await
            .unwrap();

        assert!(created.is_none());
        assert_eq!(notification_rows(&db).await, 0);
    }

    #[tokio::test]
    async fn test_live_subscriber_marks_notification_delivered() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user()
            .withf(|user_id, destination, payload| {
                *user_id == 1 && destination == "/queue/notifications" && payload["type"] == "FOLLOW"
            })
            .times(1)
            .return_const(1usize);
        let (service, _db) = setup(push).await;

        let view = service
            .create_notification(NotificationType::Follow, "bob started following you", 2, 1, None)
            .await
            .unwrap()
            .unwrap();

        assert!(view.delivered);
        assert!(view.delivered_at.is_some());
        assert!(!view.is_read);
        assert_eq!(view.from_username, "bob");
    }

    #[tokio::test]
    async fn test_offline_recipient_keeps_row_undelivered() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().times(1).return_const(0usize);
        let (service, db) = setup(push).await;

        let view = service
            .create_notification(NotificationType::Like, "bob liked your post", 2, 1, None)
            .await
            .unwrap()
            .unwrap();

        assert!(!view.delivered);
        assert_eq!(notification_rows(&db).await, 1);
        assert_eq!(service.get_unread_notification_count("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_comment_preview_is_truncated() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().return_const(0usize);
        let (service, db) = setup(push).await;

        let bob = User {
            id: 2,
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: String::new(),
            name: None,
            bio: None,
            profile_picture: None,
            created_at: Utc::now(),
        };
        let (post_id,): (i64,) =
            sqlx::query_as("INSERT INTO posts (user_id, caption, created_at) VALUES (1, 'hello', ?) RETURNING id")
                .bind(Utc::now())
                .fetch_one(db.pool())
                .await
                .unwrap();

        let long_comment = "x".repeat(80);
        let view = service
            .create_comment_notification(&bob, 1, post_id, &long_comment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            view.message,
            format!("bob commented on your post: {}...", "x".repeat(50))
        );
        assert_eq!(view.post_id, Some(post_id));

        let short = service
            .create_comment_notification(&bob, 1, post_id, "nice!")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(short.message, "bob commented on your post: nice!");
    }

    #[tokio::test]
    async fn test_mark_as_read_pushes_unread_count_once() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user()
            .withf(|_, destination, _| destination == "/queue/notifications")
            .return_const(0usize);
        push.expect_send_to_user()
            .withf(|user_id, destination, payload| {
                *user_id == 1
                    && destination == "/queue/notifications/count"
                    && payload["unreadCount"] == 0
            })
            .times(1)
            .return_const(0usize);
        let (service, _db) = setup(push).await;

        let view = service
            .create_notification(NotificationType::Follow, "bob started following you", 2, 1, None)
            .await
            .unwrap()
            .unwrap();

        let read = service.mark_as_read(view.id, 1).await.unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());

        // second call is a no-op: no extra count push
        let again = service.mark_as_read(view.id, 1).await.unwrap();
        assert_eq!(again.read_at, read.read_at);
    }

    #[tokio::test]
    async fn test_mark_as_read_errors() {
        let mut push = MockPushDelivery::new();
        push.expect_send_to_user().return_const(0usize);
        let (service, _db) = setup(push).await;

        assert!(matches!(service.mark_as_read(999, 1).await, Err(AppError::NotFound(_))));

        let view = service
            .create_notification(NotificationType::Follow, "bob started following you", 2, 1, None)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(service.mark_as_read(view.id, 2).await, Err(AppError::Authorization(_))));
    }
}
