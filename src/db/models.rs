use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::news::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of artifact a message carries. `None` is the inbound user
/// prompt; assistant messages carry text or a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    None,
    Text,
    Image,
    Video,
}

impl ContentKind {
    /// `None` maps to SQL NULL, everything else to its label.
    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            ContentKind::None => None,
            ContentKind::Text => Some("text"),
            ContentKind::Image => Some("image"),
            ContentKind::Video => Some("video"),
        }
    }

    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("text") => ContentKind::Text,
            Some("image") => ContentKind::Image,
            Some("video") => ContentKind::Video,
            _ => ContentKind::None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db().unwrap_or("none"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub user_id: Option<Uuid>,
    /// Cached retrieval results, reused across turns until stale.
    pub news: Vec<Article>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub kind: ContentKind,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    /// Snapshot of the news the message was produced from, if any.
    pub news: Option<Vec<Article>>,
    pub created_at: DateTime<Utc>,
}
