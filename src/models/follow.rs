use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: i64,
    pub followee_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of the toggling follow call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed(Follow),
    Unfollowed,
}

impl FollowOutcome {
    pub fn is_following(&self) -> bool {
        matches!(self, FollowOutcome::Followed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowProfile {
    pub user_id: i64,
    pub username: String,
    pub profile_picture: Option<String>,
    pub is_following: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}
