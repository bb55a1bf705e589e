use crate::{
    error::{AppError, Result},
    models::{
        follow::{Follow, FollowOutcome, FollowProfile},
        user::{User, UserSummary},
    },
    services::{Database, NotificationService},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl FollowService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    /// Toggles the edge: an existing follow is removed, otherwise one is
    /// created and the followee is notified.
    pub async fn follow_user(&self, follower_id: i64, followee_id: i64) -> Result<FollowOutcome> {
        debug!("User {} toggling follow on user {}", follower_id, followee_id);

        let follower = self.load_user(follower_id).await?;
        self.load_user(followee_id).await?;

        // 防止自己关注自己
        if follower_id == followee_id {
            return Err(AppError::bad_request("Cannot follow yourself"));
        }

        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.db.pool())
            .await?;
        if removed.rows_affected() > 0 {
            info!("User {} unfollowed user {}", follower_id, followee_id);
            return Ok(FollowOutcome::Unfollowed);
        }

        let inserted: Option<Follow> = sqlx::query_as(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(Utc::now())
        .fetch_optional(self.db.pool())
        .await?;

        let follow = match inserted {
            Some(follow) => follow,
            // a concurrent request created the edge first
            None => return Ok(FollowOutcome::Followed(self.get_edge(follower_id, followee_id).await?)),
        };

        if let Err(e) = self
            .notification_service
            .create_follow_notification(&follower, followee_id)
            .await
        {
            warn!("Failed to send follow notification: {}", e);
        }

        info!("User {} followed user {}", follower_id, followee_id);
        Ok(FollowOutcome::Followed(follow))
    }

    /// Removing a missing edge is not an error.
    pub async fn unfollow_user(&self, follower_id: i64, followee_id: i64) -> Result<()> {
        debug!("User {} unfollowing user {}", follower_id, followee_id);
        self.load_user(followee_id).await?;

        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    pub async fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?")
                .bind(follower_id)
                .bind(followee_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn get_followers_count(&self, user_id: i64) -> Result<i64> {
        self.load_user(user_id).await?;
        self.count("SELECT COUNT(*) FROM follows WHERE followee_id = ?", user_id)
            .await
    }

    pub async fn get_following_count(&self, user_id: i64) -> Result<i64> {
        self.load_user(user_id).await?;
        self.count("SELECT COUNT(*) FROM follows WHERE follower_id = ?", user_id)
            .await
    }

    pub async fn get_posts_count(&self, user_id: i64) -> Result<i64> {
        self.load_user(user_id).await?;
        self.count("SELECT COUNT(*) FROM posts WHERE user_id = ?", user_id)
            .await
    }

    /// 获取用户的关注者列表
    pub async fn get_followers(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        debug!("Getting followers for user: {}", user_id);
        self.load_user(user_id).await?;

        let users = sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.username, u.profile_picture, u.name
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.followee_id = ?
            ORDER BY f.created_at DESC, u.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    /// 获取用户关注的人列表
    pub async fn get_following(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        debug!("Getting following for user: {}", user_id);
        self.load_user(user_id).await?;

        let users = sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.username, u.profile_picture, u.name
            FROM follows f
            JOIN users u ON u.id = f.followee_id
            WHERE f.follower_id = ?
            ORDER BY f.created_at DESC, u.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    /// Profile card of `target_id` as seen by `viewer_id`
    pub async fn get_follow_profile(&self, target_id: i64, viewer_id: i64) -> Result<FollowProfile> {
        let target = self.load_user(target_id).await?;

        Ok(FollowProfile {
            user_id: target.id,
            username: target.username,
            profile_picture: target.profile_picture,
            is_following: self.is_following(viewer_id, target_id).await?,
            followers_count: self.get_followers_count(target_id).await?,
            following_count: self.get_following_count(target_id).await?,
            posts_count: self.get_posts_count(target_id).await?,
        })
    }

    async fn get_edge(&self, follower_id: i64, followee_id: i64) -> Result<Follow> {
        sqlx::query_as("SELECT * FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Follow"))
    }

    async fn load_user(&self, user_id: i64) -> Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn count(&self, sql: &str, user_id: i64) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
