use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::{UpdateProfileRequest, User, UserSummary},
    services::{storage::FileStorage, Database},
    utils::{
        image::ImagePayload,
        validation::{validate_text, validate_username},
    },
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    storage: Arc<dyn FileStorage>,
    max_bio_length: usize,
    tagging_suggestion_limit: i64,
}

impl UserService {
    pub async fn new(db: Arc<Database>, storage: Arc<dyn FileStorage>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            storage,
            max_bio_length: config.max_bio_length,
            tagging_suggestion_limit: config.tagging_suggestion_limit,
        })
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
    }

    pub async fn get_current_user(&self, user_id: i64) -> Result<User> {
        self.find_by_id(user_id).await
    }

    /// 按用户名或姓名模糊搜索（不区分大小写）
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Searching users for '{}'", query);

        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let users = sqlx::query_as(
            r#"
            SELECT id AS user_id, username, profile_picture, name
            FROM users
            WHERE LOWER(username) LIKE ? ESCAPE '\'
               OR LOWER(COALESCE(name, '')) LIKE ? ESCAPE '\'
            ORDER BY username
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    pub async fn update_bio(&self, user_id: i64, bio: &str) -> Result<User> {
        debug!("Updating bio for user {}", user_id);
        self.check_bio(bio)?;

        let user = sqlx::query_as("UPDATE users SET bio = ? WHERE id = ? RETURNING *")
            .bind(bio)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        Ok(user)
    }

    /// Only the supplied fields change.
    pub async fn update_profile(&self, user_id: i64, request: UpdateProfileRequest) -> Result<User> {
        debug!("Updating profile for user {}", user_id);
        request.validate()?;

        let current = self.find_by_id(user_id).await?;

        if let Some(username) = request.username.as_deref() {
            if username != current.username {
                validate_username(username)?;
                let taken: Option<(i64,)> =
                    sqlx::query_as("SELECT id FROM users WHERE username = ? AND id <> ?")
                        .bind(username)
                        .bind(user_id)
                        .fetch_optional(self.db.pool())
                        .await?;
                if taken.is_some() {
                    return Err(AppError::conflict("Username is already taken"));
                }
            }
        }
        if let Some(bio) = request.bio.as_deref() {
            self.check_bio(bio)?;
        }
        if let Some(picture) = request.profile_picture.as_deref() {
            if !is_own_profile_image(user_id, picture) {
                return Err(AppError::forbidden("Profile picture must be one of your own uploads"));
            }
        }

        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET username = ?, name = ?, bio = ?, profile_picture = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(request.username.unwrap_or(current.username))
        .bind(request.name.or(current.name))
        .bind(request.bio.or(current.bio))
        .bind(request.profile_picture.or(current.profile_picture))
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            if err.is_unique_violation() {
                AppError::conflict("Username is already taken")
            } else {
                err
            }
        })?;

        info!("Updated profile of user {}", user.id);
        Ok(user)
    }

    /// Stores the new picture first; the old file is only removed once the
    /// replacement is safely written.
    pub async fn update_profile_image(&self, user_id: i64, image: &ImagePayload) -> Result<User> {
        debug!("Updating profile image for user {} ({})", user_id, image.kind());
        let current = self.find_by_id(user_id).await?;

        let directory = format!("profiles/{}", user_id);
        let path = self.storage.store(image, &directory).await?;

        if let Some(old) = current.profile_picture.as_deref() {
            if !is_own_profile_image(user_id, old) {
                warn!("Not deleting profile image {} outside profiles/{}", old, user_id);
            } else if let Err(e) = self.storage.delete(old).await {
                warn!("Failed to delete old profile image {}: {}", old, e);
            }
        }

        let user = sqlx::query_as("UPDATE users SET profile_picture = ? WHERE id = ? RETURNING *")
            .bind(&path)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(user)
    }

    /// Followers of the caller offered as tag suggestions
    pub async fn get_followers_for_tagging(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        let users = sqlx::query_as(
            r#"
            SELECT u.id AS user_id, u.username, u.profile_picture, u.name
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.followee_id = ?
            ORDER BY f.created_at DESC, u.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(self.tagging_suggestion_limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(users)
    }

    // an empty bio clears it
    fn check_bio(&self, bio: &str) -> Result<()> {
        if bio.trim().is_empty() {
            return Ok(());
        }
        validate_text("Bio", bio, self.max_bio_length)
    }
}

/// Only a single file directly under `/uploads/profiles/{user_id}/` counts.
fn is_own_profile_image(user_id: i64, path: &str) -> bool {
    let prefix = format!("/uploads/profiles/{}/", user_id);
    path.strip_prefix(&prefix)
        .map(|name| !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\']))
        .unwrap_or(false)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c\\d"), "a\\_b\\%c\\\\d");
        assert_eq!(escape_like("alice"), "alice");
    }

    #[test]
    fn test_own_profile_image_paths() {
        assert!(is_own_profile_image(7, "/uploads/profiles/7/a.png"));
        assert!(!is_own_profile_image(7, "/uploads/profiles/8/a.png"));
        assert!(!is_own_profile_image(7, "/uploads/profiles/77/a.png"));
        assert!(!is_own_profile_image(7, "/uploads/posts/7/a.png"));
        assert!(!is_own_profile_image(7, "/uploads/profiles/7/../../posts/1/a.png"));
        assert!(!is_own_profile_image(7, "/uploads/profiles/7/"));
        assert!(!is_own_profile_image(7, "https://cdn.example.com/a.png"));
    }
}
