//! Post domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-authored post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// Author.
    pub user_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
}

/// Partial update of a post. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub content: Option<String>,
    /// `Some(None)` removes the media URL.
    pub media_url: Option<Option<String>>,
}

impl PostChanges {
    /// Apply the changes to a post in place, bumping `updated_at`.
    pub fn apply_to(self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(media_url) = self.media_url {
            post.media_url = media_url;
        }
        post.updated_at = now;
    }
}
