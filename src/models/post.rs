use crate::utils::image::ImagePayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Post joined with its owner and engagement counts
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: Option<String>,
    pub caption: Option<String>,
    pub image_urls: Json<Vec<String>>,
    pub tagged_people: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post_id: i64,
    pub content: Option<String>,
    pub caption: Option<String>,
    pub display_caption: String,
    pub created_at: DateTime<Utc>,
    pub image_urls: Vec<String>,
    pub user_id: i64,
    pub username: String,
    pub tagged_people: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        let tagged_people = row.tagged_people.0;
        Self {
            post_id: row.id,
            display_caption: display_caption(row.caption.as_deref(), &tagged_people),
            content: row.content,
            caption: row.caption,
            created_at: row.created_at,
            image_urls: row.image_urls.0,
            user_id: row.user_id,
            username: row.username,
            tagged_people,
            like_count: row.like_count,
            comment_count: row.comment_count,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedPostRow {
    #[sqlx(flatten)]
    pub post: PostRow,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPostView {
    #[serde(flatten)]
    pub post: PostView,
    pub saved_at: DateTime<Utc>,
}

/// `imageBase64` arrives either as one string or as a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImageField {
    One(String),
    Many(Vec<serde_json::Value>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub caption: Option<String>,
    pub image_base64: Option<ImageField>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tagged_people: Vec<String>,
}

impl CreatePostRequest {
    /// Every submitted image, classified. Non-string list items are dropped.
    pub fn images(&self) -> Vec<ImagePayload> {
        let mut raw: Vec<&str> = Vec::new();

        match &self.image_base64 {
            Some(ImageField::One(value)) => raw.push(value),
            Some(ImageField::Many(values)) => {
                raw.extend(values.iter().filter_map(|value| value.as_str()))
            }
            None => {}
        }

        if let Some(url) = &self.image_url {
            raw.push(url);
        }

        raw.into_iter()
            .filter(|value| !value.trim().is_empty())
            .map(ImagePayload::classify)
            .collect()
    }

    pub fn tagged_usernames(&self) -> Vec<String> {
        self.tagged_people
            .iter()
            .map(|name| name.trim().trim_start_matches('@').to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Caption followed by the tagged usernames, e.g. "hello with bob and carol".
pub fn display_caption(caption: Option<&str>, tagged: &[String]) -> String {
    let caption = caption.unwrap_or_default().trim();

    let tags = match tagged {
        [] => return caption.to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    };

    if caption.is_empty() {
        format!("with {}", tags)
    } else {
        format!("{} with {}", caption, tags)
    }
}
