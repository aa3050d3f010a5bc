use serde::{Deserialize, Serialize};

use super::{ContentItem, TagSet};

/// Snapshot of a user's tag sets used to build a feed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedFilter {
    pub include_tags: TagSet,
    pub exclude_tags: TagSet,
}

/// A feed item with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub item: ContentItem,
    /// Number of the user's include tags the item carries
    pub score: usize,
}

impl FeedFilter {
    /// An item is admitted only if it carries none of the excluded tags,
    /// whatever its overlap with the include tags.
    pub fn admits(&self, item: &ContentItem) -> bool {
        !item.tags.intersects(&self.exclude_tags)
    }

    pub fn score(&self, item: &ContentItem) -> usize {
        item.tags.overlap(&self.include_tags)
    }

    /// Drops excluded items, ranks the rest and keeps the first `limit`.
    ///
    /// Ranking is by include-tag overlap, then newest first.
    pub fn apply<I>(&self, candidates: I, limit: usize) -> Vec<FeedEntry>
    where
        I: IntoIterator<Item = ContentItem>,
    {
        let mut entries: Vec<FeedEntry> = candidates
            .into_iter()
            .filter(|item| self.admits(item))
            .map(|item| FeedEntry {
                score: self.score(&item),
                item,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.item.published_at.cmp(&a.item.published_at))
        });
        entries.truncate(limit);
        entries
    }
}
