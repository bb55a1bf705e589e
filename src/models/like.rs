use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    pub like_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}
