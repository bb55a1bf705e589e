use crate::{
    error::{AppError, Result},
    models::post::{CreatePostRequest, PostRow, PostView, SavedPostRow, SavedPostView},
    services::{storage::FileStorage, Database},
};
use chrono::Utc;
use sqlx::types::Json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SELECT_POST: &str = r#"
    SELECT p.id, p.user_id, u.username, p.content, p.caption,
           p.image_urls, p.tagged_people, p.created_at,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

#[derive(Clone)]
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<dyn FileStorage>,
}

impl PostService {
    pub async fn new(db: Arc<Database>, storage: Arc<dyn FileStorage>) -> Result<Self> {
        Ok(Self { db, storage })
    }

    /// Stores each image under `posts/{user_id}`; an image that cannot be
    /// stored is logged and left out rather than failing the post.
    pub async fn create_post(&self, user_id: i64, request: CreatePostRequest) -> Result<PostView> {
        debug!("Creating post for user {}", user_id);
        self.ensure_user(user_id).await?;

        let directory = format!("posts/{}", user_id);
        let mut image_urls = Vec::new();
        for image in request.images() {
            match self.storage.store(&image, &directory).await {
                Ok(path) => image_urls.push(path),
                Err(e) => warn!("Skipping {} image for user {}: {}", image.kind(), user_id, e),
            }
        }

        let tagged_people = request.tagged_usernames();

        let (post_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (user_id, content, caption, image_urls, tagged_people, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&request.content)
        .bind(&request.caption)
        .bind(Json(&image_urls))
        .bind(Json(&tagged_people))
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;

        info!("User {} created post {} with {} images", user_id, post_id, image_urls.len());
        self.get_post(post_id).await
    }

    pub async fn get_post(&self, post_id: i64) -> Result<PostView> {
        let sql = format!("{} WHERE p.id = ?", SELECT_POST);
        let row: PostRow = sqlx::query_as(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        Ok(row.into())
    }

    /// 获取指定用户的帖子
    pub async fn get_user_posts(&self, username: &str) -> Result<Vec<PostView>> {
        let user: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        let (user_id,) = user.ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;

        let sql = format!(
            "{} WHERE p.user_id = ? ORDER BY p.created_at DESC, p.id DESC",
            SELECT_POST
        );
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    pub async fn get_all_posts(&self) -> Result<Vec<PostView>> {
        let sql = format!("{} ORDER BY p.created_at DESC, p.id DESC", SELECT_POST);
        let rows: Vec<PostRow> = sqlx::query_as(&sql).fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(PostView::from).collect())
    }

    /// The feed is every post, newest first; the follow graph is not consulted.
    pub async fn get_news_feed(&self, user_id: i64) -> Result<Vec<PostView>> {
        debug!("Building news feed for user {}", user_id);
        self.ensure_user(user_id).await?;
        self.get_all_posts().await
    }

    /// Saving twice is a no-op.
    pub async fn save_post(&self, user_id: i64, post_id: i64) -> Result<()> {
        self.ensure_user(user_id).await?;
        self.ensure_post(post_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO post_saves (user_id, post_id, saved_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, post_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            info!("User {} saved post {}", user_id, post_id);
        }
        Ok(())
    }

    pub async fn unsave_post(&self, user_id: i64, post_id: i64) -> Result<()> {
        self.ensure_post(post_id).await?;

        sqlx::query("DELETE FROM post_saves WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    pub async fn is_post_saved(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM post_saves WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    pub async fn get_saved_posts(&self, user_id: i64) -> Result<Vec<SavedPostView>> {
        self.ensure_user(user_id).await?;

        let sql = format!(
            r#"
            SELECT post.*, s.saved_at
            FROM post_saves s
            JOIN ({}) post ON post.id = s.post_id
            WHERE s.user_id = ?
            ORDER BY s.saved_at DESC, s.id DESC
            "#,
            SELECT_POST
        );
        let rows: Vec<SavedPostRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SavedPostView {
                post: row.post.into(),
                saved_at: row.saved_at,
            })
            .collect())
    }

    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|_| ()).ok_or_else(|| AppError::not_found("User"))
    }

    async fn ensure_post(&self, post_id: i64) -> Result<()> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|_| ()).ok_or_else(|| AppError::not_found("Post"))
    }
}
