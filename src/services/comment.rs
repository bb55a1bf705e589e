use crate::{
    config::Config,
    error::{AppError, Result},
    models::{comment::CommentView, user::User},
    services::{Database, NotificationService},
    utils::validation::validate_text,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SELECT_COMMENT: &str = r#"
    SELECT c.id AS comment_id, c.comment, c.created_at, c.post_id,
           c.user_id, u.username, u.profile_picture
    FROM comments c
    JOIN users u ON u.id = c.user_id
"#;

#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
    notification_service: NotificationService,
    max_comment_length: usize,
}

impl CommentService {
    pub async fn new(
        db: Arc<Database>,
        notification_service: NotificationService,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
            max_comment_length: config.max_comment_length,
        })
    }

    pub async fn create_comment(&self, user_id: i64, post_id: i64, text: &str) -> Result<CommentView> {
        debug!("Creating comment for post: {}", post_id);
        validate_text("Comment", text, self.max_comment_length)?;

        let author: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let owner_id = self.post_owner(post_id).await?;

        let (comment_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO comments (post_id, user_id, comment, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        info!("User {} commented on post {}", user_id, post_id);

        if let Err(e) = self
            .notification_service
            .create_comment_notification(&author, owner_id, post_id, text)
            .await
        {
            warn!("Failed to send comment notification: {}", e);
        }

        self.get_comment(comment_id).await
    }

    pub async fn get_comment(&self, comment_id: i64) -> Result<CommentView> {
        let sql = format!("{} WHERE c.id = ?", SELECT_COMMENT);
        sqlx::query_as(&sql)
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    pub async fn get_post_comments(&self, post_id: i64) -> Result<Vec<CommentView>> {
        debug!("Getting comments for post: {}", post_id);
        self.post_owner(post_id).await?;

        let sql = format!(
            "{} WHERE c.post_id = ? ORDER BY c.created_at DESC, c.id DESC",
            SELECT_COMMENT
        );
        let comments = sqlx::query_as(&sql)
            .bind(post_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(comments)
    }

    /// 只有评论作者可以删除
    pub async fn delete_comment(&self, user_id: i64, comment_id: i64) -> Result<()> {
        let comment = self.get_comment(comment_id).await?;
        if comment.user_id != user_id {
            return Err(AppError::forbidden("You can only delete your own comments"));
        }

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        info!("Comment {} deleted by user {}", comment_id, user_id);
        Ok(())
    }

    pub async fn count_comments(&self, post_id: i64) -> Result<i64> {
        self.post_owner(post_id).await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
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
