use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "LIKE",
            NotificationType::Comment => "COMMENT",
            NotificationType::Follow => "FOLLOW",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(NotificationType::Like),
            "COMMENT" => Ok(NotificationType::Comment),
            "FOLLOW" => Ok(NotificationType::Follow),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

/// Notification joined with its sender and the related post's images
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub notification_type: String,
    pub message: String,
    pub from_user_id: i64,
    pub from_username: String,
    pub from_user_profile_picture: Option<String>,
    pub to_user_id: i64,
    pub post_id: Option<i64>,
    pub post_image_urls: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub from_user_id: i64,
    pub from_username: String,
    pub from_user_profile_picture: Option<String>,
    pub to_user_id: i64,
    pub post_id: Option<i64>,
    pub post_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for NotificationView {
    type Error = String;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            notification_type: row.notification_type.parse()?,
            message: row.message,
            from_user_id: row.from_user_id,
            from_username: row.from_username,
            from_user_profile_picture: row.from_user_profile_picture,
            to_user_id: row.to_user_id,
            post_id: row.post_id,
            post_image_url: row
                .post_image_urls
                .and_then(|urls| urls.0.into_iter().next()),
            created_at: row.created_at,
            is_read: row.is_read,
            read_at: row.read_at,
            delivered: row.delivered,
            delivered_at: row.delivered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_round_trips_through_storage_text() {
        for kind in [NotificationType::Like, NotificationType::Comment, NotificationType::Follow] {
            assert_eq!(kind.as_str().parse::<NotificationType>(), Ok(kind));
        }
        assert!("MENTION".parse::<NotificationType>().is_err());
    }

    #[test]
    fn test_view_serializes_type_field() {
        let view = NotificationView {
            id: 1,
            notification_type: NotificationType::Comment,
            message: "bob commented on your post: nice!".to_string(),
            from_user_id: 2,
            from_username: "bob".to_string(),
            from_user_profile_picture: None,
            to_user_id: 1,
            post_id: Some(7),
            post_image_url: None,
            created_at: Utc::now(),
            is_read: false,
            read_at: None,
            delivered: false,
            delivered_at: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "COMMENT");
        assert_eq!(json["fromUsername"], "bob");
        assert_eq!(json["isRead"], false);
    }
}
