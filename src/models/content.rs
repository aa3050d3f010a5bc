use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, TagSet, UserId};
use crate::error::{AppError, AppResult};

/// Metadata of a published video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: ContentId,
    pub owner_id: UserId,
    pub title: String,
    pub tags: TagSet,
    pub published_at: DateTime<Utc>,
}

impl ContentItem {
    /// Creates a content item with a trimmed, non-empty title
    pub fn new(owner_id: UserId, title: &str, tags: TagSet, now: DateTime<Utc>) -> AppResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
        }

        Ok(Self {
            id: ContentId::new(),
            owner_id,
            title: title.to_string(),
            tags,
            published_at: now,
        })
    }
}
