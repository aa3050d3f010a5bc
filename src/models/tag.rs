use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Longest tag accepted after normalization
pub const MAX_TAG_LEN: usize = 64;

/// A normalized content tag (trimmed, lowercase, non-empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Normalizes raw user input into a tag
    pub fn parse(raw: &str) -> AppResult<Self> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(AppError::InvalidInput("Tag cannot be empty".to_string()));
        }

        if normalized.chars().count() > MAX_TAG_LEN {
            return Err(AppError::InvalidInput(format!(
                "Tag cannot be longer than {} characters",
                MAX_TAG_LEN
            )));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Tag::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Which of a user's two tag sets an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Self-declared interests
    Include,
    /// Content to suppress
    Exclude,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Include => "include",
            TagKind::Exclude => "exclude",
        }
    }
}

impl Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of unique tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Inserts a tag, returning false if it was already present
    pub fn insert(&mut self, tag: Tag) -> bool {
        self.0.insert(tag)
    }

    /// Removes a tag, returning false if it was absent
    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.0.remove(tag)
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// True if any tag is shared with `other`
    pub fn intersects(&self, other: &TagSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().any(|t| large.contains(t))
    }

    /// Number of tags shared with `other`
    pub fn overlap(&self, other: &TagSet) -> usize {
        self.iter().filter(|t| other.contains(t)).count()
    }

    /// Tags as plain strings, for storage backends
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|t| t.0.clone()).collect()
    }

    /// Rebuilds a set from stored strings, normalizing and skipping invalid entries
    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .filter_map(|v| Tag::parse(v.as_ref()).ok())
            .collect()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<T: IntoIterator<Item = Tag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
