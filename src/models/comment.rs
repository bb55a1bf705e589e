use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub comment_id: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub comment: String,
}
