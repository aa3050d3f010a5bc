use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{LinkId, LinkStatus, NotificationId, ParentChildLink, UserId};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A parent asks to supervise the recipient
    ParentRequest,
    /// The child answered the recipient's request
    ParentResponse,
    /// The other party removed an active link
    ParentUnlinked,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ParentRequest => "PARENT_REQUEST",
            NotificationKind::ParentResponse => "PARENT_RESPONSE",
            NotificationKind::ParentUnlinked => "PARENT_UNLINKED",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PARENT_REQUEST" => Ok(NotificationKind::ParentRequest),
            "PARENT_RESPONSE" => Ok(NotificationKind::ParentResponse),
            "PARENT_UNLINKED" => Ok(NotificationKind::ParentUnlinked),
            other => Err(AppError::Internal(format!(
                "Unknown notification kind: {}",
                other
            ))),
        }
    }
}

/// A stored notification.
///
/// Notifications are generated by link transitions and never carry a status
/// of their own; request status is read from the referenced link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub kind: NotificationKind,
    pub link_id: Option<LinkId>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        recipient_id: UserId,
        sender_id: UserId,
        kind: NotificationKind,
        link_id: LinkId,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id,
            sender_id,
            kind,
            link_id: Some(link_id),
            message,
            read: false,
            created_at: now,
        }
    }

    /// Request delivered to the child when a parent asks to link
    pub fn parent_request(link: &ParentChildLink, parent_username: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            link.child_id,
            link.parent_id,
            NotificationKind::ParentRequest,
            link.id,
            format!("{} wants to become your parent account", parent_username),
            now,
        )
    }

    /// Outcome delivered to the parent once the child answers
    pub fn parent_response(link: &ParentChildLink, child_username: &str, now: DateTime<Utc>) -> Self {
        let message = match link.status {
            LinkStatus::Accepted => format!(
                "{} accepted your parent request. You can now manage their content preferences.",
                child_username
            ),
            _ => format!("{} declined your parent request", child_username),
        };
        Self::new(
            link.parent_id,
            link.child_id,
            NotificationKind::ParentResponse,
            link.id,
            message,
            now,
        )
    }

    /// Notice delivered to the party that did not remove the link
    pub fn parent_unlinked(
        link: &ParentChildLink,
        actor: UserId,
        actor_username: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            link.counterpart(actor),
            actor,
            NotificationKind::ParentUnlinked,
            link.id,
            format!("{} removed the parent link", actor_username),
            now,
        )
    }

    /// True while this is a request still awaiting the child's answer
    pub fn awaits_response(&self, status: Option<LinkStatus>) -> bool {
        self.kind == NotificationKind::ParentRequest && status == Some(LinkStatus::Pending)
    }

    pub fn into_view(self, link_status: Option<LinkStatus>) -> NotificationView {
        let status = match self.kind {
            NotificationKind::ParentRequest => link_status,
            _ => None,
        };
        NotificationView {
            notification: self,
            status,
        }
    }
}

/// A notification as seen by its recipient, with the request status joined in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub status: Option<LinkStatus>,
}
