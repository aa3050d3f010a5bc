use chrono::Utc;

use crate::{
    config::Config,
    db::Store,
    error::AppResult,
    models::{ContentItem, FeedEntry, Tag, TagSet, UserId},
    services::tags,
};

/// How much content a feed looks at and returns
#[derive(Debug, Clone, Copy)]
pub struct FeedLimits {
    pub page_size: usize,
    pub candidate_window: usize,
}

impl From<&Config> for FeedLimits {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.feed_page_size,
            candidate_window: config.feed_candidate_window,
        }
    }
}

/// Builds the personalized feed for `user`.
///
/// The store pre-filters on the exclude set; the feed filter checks again so
/// no item carrying an excluded tag is returned even from a lax store.
pub async fn get_user_feed(
    store: &dyn Store,
    user: UserId,
    limits: FeedLimits,
) -> AppResult<Vec<FeedEntry>> {
    let filter = tags::derive_feed_filter(store, user).await?;

    let candidates = store
        .recent_content(&filter.exclude_tags, limits.candidate_window)
        .await?;
    let candidate_count = candidates.len();
    let entries = filter.apply(candidates, limits.page_size);

    tracing::debug!(
        user = %user,
        candidates = candidate_count,
        returned = entries.len(),
        "Feed built"
    );

    Ok(entries)
}

/// Publishes content metadata so it can appear in feeds
pub async fn publish(
    store: &dyn Store,
    owner: UserId,
    title: &str,
    raw_tags: &[String],
) -> AppResult<ContentItem> {
    let tags = raw_tags
        .iter()
        .map(|raw| Tag::parse(raw))
        .collect::<AppResult<TagSet>>()?;

    let item = ContentItem::new(owner, title, tags, Utc::now())?;
    store.insert_content(item.clone()).await?;

    tracing::info!(content_id = %item.id, owner = %owner, tags = item.tags.len(), "Content published");
    Ok(item)
}
