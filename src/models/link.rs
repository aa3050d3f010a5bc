use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::{LinkId, UserId};
use crate::error::{AppError, AppResult};

/// Status of a parent-child link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Pending,
    Accepted,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "PENDING",
            LinkStatus::Accepted => "ACCEPTED",
            LinkStatus::Rejected => "REJECTED",
        }
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(LinkStatus::Pending),
            "ACCEPTED" => Ok(LinkStatus::Accepted),
            "REJECTED" => Ok(LinkStatus::Rejected),
            other => Err(AppError::Internal(format!("Unknown link status: {}", other))),
        }
    }
}

/// A supervising relation requested by a parent and answered by a child
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentChildLink {
    pub id: LinkId,
    pub parent_id: UserId,
    pub child_id: UserId,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    /// Set when an accepted link is removed; the record is kept for history
    pub unlinked_at: Option<DateTime<Utc>>,
}

impl ParentChildLink {
    /// Creates a pending request
    pub fn new(parent_id: UserId, child_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: LinkId::new(),
            parent_id,
            child_id,
            status: LinkStatus::Pending,
            created_at: now,
            responded_at: None,
            unlinked_at: None,
        }
    }

    /// True while the parent holds authority over the child's exclude tags
    pub fn is_active(&self) -> bool {
        self.status == LinkStatus::Accepted && self.unlinked_at.is_none()
    }

    /// True if the two users are this link's parent and child, in either order
    pub fn joins(&self, a: UserId, b: UserId) -> bool {
        (self.parent_id == a && self.child_id == b) || (self.parent_id == b && self.child_id == a)
    }

    /// The party on the other side of `user`
    pub fn counterpart(&self, user: UserId) -> UserId {
        if self.parent_id == user {
            self.child_id
        } else {
            self.parent_id
        }
    }
}

/// All links in which one user is the child.
///
/// Every link transition goes through this aggregate so the single-active-parent
/// rule is checked against the child's complete history in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct Guardianship {
    pub child_id: UserId,
    pub links: Vec<ParentChildLink>,
}

impl Guardianship {
    pub fn new(child_id: UserId, links: Vec<ParentChildLink>) -> Self {
        Self { child_id, links }
    }

    /// The parent currently holding authority, if any
    pub fn active_parent(&self) -> Option<UserId> {
        self.links
            .iter()
            .find(|l| l.is_active())
            .map(|l| l.parent_id)
    }

    pub fn has_parent(&self) -> bool {
        self.active_parent().is_some()
    }

    pub fn find(&self, link_id: LinkId) -> Option<&ParentChildLink> {
        self.links.iter().find(|l| l.id == link_id)
    }

    /// Records a new pending request from `parent_id`
    pub fn request(&mut self, parent_id: UserId, now: DateTime<Utc>) -> AppResult<ParentChildLink> {
        if parent_id == self.child_id {
            return Err(AppError::InvalidInput(
                "Cannot send a parent request to yourself".to_string(),
            ));
        }

        if let Some(active) = self.active_parent() {
            let msg = if active == parent_id {
                "You are already linked to this user".to_string()
            } else {
                "This user already has a parent account".to_string()
            };
            return Err(AppError::AlreadyLinked(msg));
        }

        if self
            .links
            .iter()
            .any(|l| l.parent_id == parent_id && l.status == LinkStatus::Pending)
        {
            return Err(AppError::InvalidState(
                "A request to this user is already pending".to_string(),
            ));
        }

        let link = ParentChildLink::new(parent_id, self.child_id, now);
        self.links.push(link.clone());
        Ok(link)
    }

    /// Applies the child's answer to a pending request
    pub fn respond(
        &mut self,
        link_id: LinkId,
        actor: UserId,
        accept: bool,
        now: DateTime<Utc>,
    ) -> AppResult<ParentChildLink> {
        if actor != self.child_id {
            return Err(AppError::Authority(
                "Only the requested child can respond to a parent request".to_string(),
            ));
        }

        let has_parent = self.has_parent();
        let link = self
            .links
            .iter_mut()
            .find(|l| l.id == link_id)
            .ok_or_else(|| AppError::NotFound("Parent request not found".to_string()))?;

        if link.status != LinkStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Parent request was already {}",
                link.status.as_str().to_lowercase()
            )));
        }

        if accept && has_parent {
            return Err(AppError::AlreadyLinked(
                "You already have a parent account; unlink it first".to_string(),
            ));
        }

        link.status = if accept {
            LinkStatus::Accepted
        } else {
            LinkStatus::Rejected
        };
        link.responded_at = Some(now);

        Ok(link.clone())
    }

    /// Removes the active link between `actor` and `other`
    pub fn unlink(
        &mut self,
        actor: UserId,
        other: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<ParentChildLink> {
        let link = self
            .links
            .iter_mut()
            .find(|l| l.is_active() && l.joins(actor, other))
            .ok_or_else(|| {
                AppError::InvalidState("No active parent link between these users".to_string())
            })?;

        link.unlinked_at = Some(now);
        Ok(link.clone())
    }
}
