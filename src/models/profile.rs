use serde::{Deserialize, Serialize};

use super::{FeedFilter, Tag, TagKind, TagSet, UserId};

/// A user's include and exclude tag sets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserTagProfile {
    /// Owner of the tag sets
    pub user_id: UserId,
    /// Self-declared interests
    pub include_tags: TagSet,
    /// Tags whose content is suppressed from the feed
    pub exclude_tags: TagSet,
}

impl UserTagProfile {
    /// Creates an empty profile
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            include_tags: TagSet::new(),
            exclude_tags: TagSet::new(),
        }
    }

    pub fn tags(&self, kind: TagKind) -> &TagSet {
        match kind {
            TagKind::Include => &self.include_tags,
            TagKind::Exclude => &self.exclude_tags,
        }
    }

    fn tags_mut(&mut self, kind: TagKind) -> &mut TagSet {
        match kind {
            TagKind::Include => &mut self.include_tags,
            TagKind::Exclude => &mut self.exclude_tags,
        }
    }

    /// Adds a tag, returning false when it was already present
    pub fn add_tag(&mut self, kind: TagKind, tag: Tag) -> bool {
        self.tags_mut(kind).insert(tag)
    }

    /// Removes a tag, returning false when it was absent
    pub fn remove_tag(&mut self, kind: TagKind, tag: &Tag) -> bool {
        self.tags_mut(kind).remove(tag)
    }

    /// Adds interaction tags to the include set, skipping excluded ones.
    ///
    /// Returns the tags that were newly added.
    pub fn absorb_interests<I>(&mut self, tags: I) -> Vec<Tag>
    where
        I: IntoIterator<Item = Tag>,
    {
        let mut added = Vec::new();
        for tag in tags {
            if self.exclude_tags.contains(&tag) {
                continue;
            }
            if self.include_tags.insert(tag.clone()) {
                added.push(tag);
            }
        }
        added
    }

    /// Read-only snapshot consumed by the feed filter
    pub fn feed_filter(&self) -> FeedFilter {
        FeedFilter {
            include_tags: self.include_tags.clone(),
            exclude_tags: self.exclude_tags.clone(),
        }
    }
}

/// A profile together with the parent currently holding authority over it
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedProfile {
    pub profile: UserTagProfile,
    pub active_parent: Option<UserId>,
}

impl GuardedProfile {
    pub fn has_parent(&self) -> bool {
        self.active_parent.is_some()
    }
}
