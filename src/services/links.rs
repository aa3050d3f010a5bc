use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{
        Guardianship, LinkStatus, Notification, NotificationId, NotificationKind,
        NotificationView, ParentChildLink, UserId,
    },
};

/// An account supervised by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildSummary {
    pub user_id: UserId,
    pub username: String,
    pub linked_at: DateTime<Utc>,
}

async fn username(store: &dyn Store, id: UserId) -> AppResult<String> {
    store
        .get_user(id)
        .await?
        .map(|u| u.username)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
}

/// Refuses a link that would make `child` supervise its own parent
async fn ensure_not_reversed(store: &dyn Store, parent: UserId, child: UserId) -> AppResult<()> {
    if store.load_guardianship(parent).await?.active_parent() == Some(child) {
        tracing::warn!(parent = %parent, child = %child, "Rejected reversed parent link");
        return Err(AppError::InvalidState(
            "This account is your parent and cannot become your child".to_string(),
        ));
    }
    Ok(())
}

/// Sends a parent request from `parent` to `child`.
///
/// Creates a pending link and delivers a request notification to the child in
/// the same unit of work.
pub async fn send_request(
    store: &dyn Store,
    parent: UserId,
    child: UserId,
) -> AppResult<ParentChildLink> {
    let parent_name = username(store, parent).await?;
    ensure_not_reversed(store, parent, child).await?;
    let now = Utc::now();

    let guardianship = store
        .update_guardianship(
            child,
            Box::new(move |g: &mut Guardianship| {
                let link = g.request(parent, now)?;
                Ok(vec![Notification::parent_request(&link, &parent_name, now)])
            }),
        )
        .await?;

    let link = guardianship
        .links
        .into_iter()
        .find(|l| l.parent_id == parent && l.status == LinkStatus::Pending)
        .ok_or_else(|| AppError::Internal("Created link missing after request".to_string()))?;

    tracing::info!(
        link_id = %link.id,
        parent = %parent,
        child = %child,
        "Parent request sent"
    );

    Ok(link)
}

/// Applies the child's answer to the request behind `notification_id`
pub async fn respond(
    store: &dyn Store,
    actor: UserId,
    notification_id: NotificationId,
    accept: bool,
) -> AppResult<NotificationView> {
    let view = store
        .get_notification(notification_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    let request = &view.notification;

    if request.recipient_id != actor {
        return Err(AppError::Authority(
            "Only the requested child can respond to a parent request".to_string(),
        ));
    }

    let link_id = match (request.kind, request.link_id) {
        (NotificationKind::ParentRequest, Some(link_id)) => link_id,
        _ => {
            return Err(AppError::InvalidState(
                "Notification is not an open parent request".to_string(),
            ))
        }
    };

    let child = request.recipient_id;
    if accept {
        ensure_not_reversed(store, request.sender_id, child).await?;
    }
    let child_name = username(store, child).await?;
    let now = Utc::now();

    store
        .update_guardianship(
            child,
            Box::new(move |g: &mut Guardianship| {
                let link = g.respond(link_id, actor, accept, now)?;
                Ok(vec![Notification::parent_response(&link, &child_name, now)])
            }),
        )
        .await?;

    tracing::info!(
        link_id = %link_id,
        child = %child,
        accepted = accept,
        "Parent request answered"
    );

    store
        .get_notification(notification_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

/// Removes the active link between `actor` and `other`, whichever side is the parent
pub async fn unlink(store: &dyn Store, actor: UserId, other: UserId) -> AppResult<ParentChildLink> {
    let child = if store.load_guardianship(other).await?.active_parent() == Some(actor) {
        other
    } else if store.load_guardianship(actor).await?.active_parent() == Some(other) {
        actor
    } else {
        return Err(AppError::InvalidState(
            "No active parent link between these users".to_string(),
        ));
    };

    unlink_as(store, actor, other, child).await
}

/// Removes the link between `parent` and `child`, acting as the parent
pub async fn unlink_child(
    store: &dyn Store,
    parent: UserId,
    child: UserId,
) -> AppResult<ParentChildLink> {
    unlink_as(store, parent, child, child).await
}

async fn unlink_as(
    store: &dyn Store,
    actor: UserId,
    other: UserId,
    child: UserId,
) -> AppResult<ParentChildLink> {
    let actor_name = username(store, actor).await?;
    let now = Utc::now();

    let guardianship = store
        .update_guardianship(
            child,
            Box::new(move |g: &mut Guardianship| {
                let link = g.unlink(actor, other, now)?;
                Ok(vec![Notification::parent_unlinked(&link, actor, &actor_name, now)])
            }),
        )
        .await?;

    let link = guardianship
        .links
        .into_iter()
        .find(|l| l.unlinked_at == Some(now) && l.joins(actor, other))
        .ok_or_else(|| AppError::Internal("Unlinked link missing after update".to_string()))?;

    tracing::info!(
        link_id = %link.id,
        actor = %actor,
        child = %child,
        "Parent link removed"
    );

    Ok(link)
}

/// Whether `user` currently has an active parent
pub async fn has_parent(store: &dyn Store, user: UserId) -> AppResult<bool> {
    Ok(store.load_guardianship(user).await?.has_parent())
}

/// Accounts currently supervised by `parent`
pub async fn children(store: &dyn Store, parent: UserId) -> AppResult<Vec<ChildSummary>> {
    let links = store.active_children(parent).await?;
    let mut children = Vec::with_capacity(links.len());

    for link in links {
        let username = username(store, link.child_id).await?;
        children.push(ChildSummary {
            user_id: link.child_id,
            username,
            linked_at: link.responded_at.unwrap_or(link.created_at),
        });
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::User;

    async fn user(store: &MemoryStore, name: &str) -> UserId {
        store
            .insert_user(User::new(name, Utc::now()).unwrap())
            .await
            .unwrap()
            .id
    }

    async fn request_notification(store: &MemoryStore, child: UserId) -> NotificationId {
        store
            .list_notifications(child)
            .await
            .unwrap()
            .into_iter()
            .find(|v| v.notification.kind == NotificationKind::ParentRequest)
            .map(|v| v.notification.id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_accept_flow() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        let link = send_request(&store, parent, child).await.unwrap();
        assert_eq!(link.status, LinkStatus::Pending);
        assert!(!has_parent(&store, child).await.unwrap());

        let notification_id = request_notification(&store, child).await;
        let view = respond(&store, child, notification_id, true).await.unwrap();
        assert_eq!(view.status, Some(LinkStatus::Accepted));
        assert!(has_parent(&store, child).await.unwrap());

        let parent_inbox = store.list_notifications(parent).await.unwrap();
        assert_eq!(parent_inbox.len(), 1);
        assert_eq!(parent_inbox[0].notification.kind, NotificationKind::ParentResponse);

        let kids = children(&store, parent).await.unwrap();
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].username, "child");
    }

    #[tokio::test]
    async fn test_duplicate_requests() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        assert!(matches!(
            send_request(&store, parent, child).await,
            Err(AppError::InvalidState(_))
        ));

        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, true).await.unwrap();

        assert!(matches!(
            send_request(&store, parent, child).await,
            Err(AppError::AlreadyLinked(_))
        ));
        let other = user(&store, "other").await;
        assert!(matches!(
            send_request(&store, other, child).await,
            Err(AppError::AlreadyLinked(_))
        ));

        // Only one request notification was ever delivered
        let requests = store
            .list_notifications(child)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.notification.kind == NotificationKind::ParentRequest)
            .count();
        assert_eq!(requests, 1);
    }

    #[tokio::test]
    async fn test_second_response_is_invalid_state() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, false).await.unwrap();

        assert!(matches!(
            respond(&store, child, notification_id, true).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(!has_parent(&store, child).await.unwrap());

        let view = store.get_notification(notification_id).await.unwrap().unwrap();
        assert_eq!(view.status, Some(LinkStatus::Rejected));
    }

    #[tokio::test]
    async fn test_only_recipient_can_respond() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;

        assert!(matches!(
            respond(&store, parent, notification_id, true).await,
            Err(AppError::Authority(_))
        ));
        assert!(matches!(
            respond(&store, child, NotificationId::new(), true).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_responding_to_a_response_is_invalid_state() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, true).await.unwrap();

        let response_id = store.list_notifications(parent).await.unwrap()[0]
            .notification
            .id;
        assert!(matches!(
            respond(&store, parent, response_id, true).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_unlink_from_either_side() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, true).await.unwrap();

        let link = unlink(&store, child, parent).await.unwrap();
        assert!(!link.is_active());
        assert!(!has_parent(&store, child).await.unwrap());

        // Request notification keeps its terminal status
        let view = store.get_notification(notification_id).await.unwrap().unwrap();
        assert_eq!(view.status, Some(LinkStatus::Accepted));

        assert!(matches!(
            unlink(&store, parent, child).await,
            Err(AppError::InvalidState(_))
        ));

        // Relink, then unlink as the parent
        send_request(&store, parent, child).await.unwrap();
        let pending = store
            .list_notifications(child)
            .await
            .unwrap()
            .into_iter()
            .find(|v| v.status == Some(LinkStatus::Pending))
            .unwrap();
        respond(&store, child, pending.notification.id, true).await.unwrap();
        unlink_child(&store, parent, child).await.unwrap();
        assert!(children(&store, parent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlink_child_rejects_non_parent() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        let stranger = user(&store, "stranger").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, true).await.unwrap();

        assert!(matches!(
            unlink_child(&store, stranger, child).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(has_parent(&store, child).await.unwrap());
    }

    #[tokio::test]
    async fn test_parent_cannot_become_child_of_own_child() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;

        send_request(&store, parent, child).await.unwrap();
        let notification_id = request_notification(&store, child).await;
        respond(&store, child, notification_id, true).await.unwrap();

        assert!(matches!(
            send_request(&store, child, parent).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(!has_parent(&store, parent).await.unwrap());
    }

    #[tokio::test]
    async fn test_crossed_requests_cannot_both_be_accepted() {
        let store = MemoryStore::new();
        let a = user(&store, "alpha").await;
        let b = user(&store, "bravo").await;

        send_request(&store, a, b).await.unwrap();
        send_request(&store, b, a).await.unwrap();

        let to_b = request_notification(&store, b).await;
        respond(&store, b, to_b, true).await.unwrap();

        let to_a = request_notification(&store, a).await;
        assert!(matches!(
            respond(&store, a, to_a, true).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(!has_parent(&store, a).await.unwrap());

        // Declining the stale request still works
        let view = respond(&store, a, to_a, false).await.unwrap();
        assert_eq!(view.status, Some(LinkStatus::Rejected));
    }

    #[tokio::test]
    async fn test_request_to_unknown_user() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        assert!(matches!(
            send_request(&store, parent, UserId::new()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
