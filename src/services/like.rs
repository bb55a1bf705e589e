use crate::{
    error::{AppError, Result},
    models::{
        like::LikeView,
        user::{User, UserSummary},
    },
    services::{Database, NotificationService},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SELECT_LIKE: &str = r#"
    SELECT l.id AS like_id, l.post_id, l.user_id, u.username, l.created_at
    FROM likes l
    JOIN users u ON u.id = l.user_id
"#;

#[derive(Clone)]
pub struct LikeService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl LikeService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    /// Liking is idempotent: a repeated like returns the existing row and
    /// does not notify again.
    pub async fn like_post(&self, user_id: i64, post_id: i64) -> Result<LikeView> {
        debug!("User {} liking post {}", user_id, post_id);

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let owner_id = self.post_owner(post_id).await?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO likes (post_id, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (post_id, user_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(self.db.pool())
        .await?;

        if inserted.is_some() {
            info!("User {} liked post {}", user_id, post_id);
            if let Err(e) = self
                .notification_service
                .create_like_notification(&user, owner_id, post_id)
                .await
            {
                warn!("Failed to send like notification: {}", e);
            }
        }

        let sql = format!("{} WHERE l.post_id = ? AND l.user_id = ?", SELECT_LIKE);
        sqlx::query_as(&sql)
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Like"))
    }

    /// Unliking a post that was never liked is not an error.
    pub async fn unlike_post(&self, user_id: i64, post_id: i64) -> Result<()> {
        self.post_owner(post_id).await?;

        let result = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            info!("User {} unliked post {}", user_id, post_id);
        }
        Ok(())
    }

    pub async fn has_user_liked(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_like_count(&self, post_id: i64) -> Result<i64> {
        self.post_owner(post_id).await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// 获取点赞用户列表
    pub async fn get_users_who_liked(&self, post_id: i64) -> Result<Vec<UserSummary>> {
        self.post_owner(post_id).await?;

        let users = sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.username, u.profile_picture, u.name
            FROM likes l
            JOIN users u ON u.id = l.user_id
            WHERE l.post_id = ?
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    async fn post_owner(&self, post_id: i64) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|(owner,)| owner)
            .ok_or_else(|| AppError::not_found("Post"))
    }
}
