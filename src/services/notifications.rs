use serde::{Deserialize, Serialize};

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{NotificationId, NotificationView, UserId},
};

/// Minimum query length before username suggestions are looked up
pub const MIN_SUGGESTION_QUERY_LEN: usize = 2;

/// A candidate child account for a parent request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSuggestion {
    pub user_id: UserId,
    pub username: String,
    /// Accounts that already have a parent cannot receive new requests
    pub has_parent: bool,
}

/// Loads a notification, hiding ones that belong to someone else
async fn owned(
    store: &dyn Store,
    recipient: UserId,
    id: NotificationId,
) -> AppResult<NotificationView> {
    store
        .get_notification(id)
        .await?
        .filter(|v| v.notification.recipient_id == recipient)
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

pub async fn list(store: &dyn Store, recipient: UserId) -> AppResult<Vec<NotificationView>> {
    store.list_notifications(recipient).await
}

pub async fn unread_count(store: &dyn Store, recipient: UserId) -> AppResult<u64> {
    store.unread_count(recipient).await
}

pub async fn mark_read(
    store: &dyn Store,
    recipient: UserId,
    id: NotificationId,
) -> AppResult<NotificationView> {
    let mut view = owned(store, recipient, id).await?;
    if !view.notification.read {
        store.mark_read(id).await?;
        view.notification.read = true;
    }
    Ok(view)
}

pub async fn mark_all_read(store: &dyn Store, recipient: UserId) -> AppResult<u64> {
    let changed = store.mark_all_read(recipient).await?;
    tracing::debug!(recipient = %recipient, changed, "Notifications marked read");
    Ok(changed)
}

/// Deletes a notification; a request still awaiting an answer cannot be deleted
pub async fn delete(store: &dyn Store, recipient: UserId, id: NotificationId) -> AppResult<()> {
    let view = owned(store, recipient, id).await?;
    if view.notification.awaits_response(view.status) {
        return Err(AppError::InvalidState(
            "Respond to the parent request before deleting it".to_string(),
        ));
    }
    store.delete_notification(id).await
}

/// Username suggestions for a parent request, excluding the caller
pub async fn username_suggestions(
    store: &dyn Store,
    actor: UserId,
    query: &str,
    limit: usize,
) -> AppResult<Vec<UserSuggestion>> {
    let query = query.trim().to_lowercase();
    if query.chars().count() < MIN_SUGGESTION_QUERY_LEN {
        return Ok(Vec::new());
    }

    // One extra row so dropping the caller still leaves `limit` results
    let users = store.search_users(&query, limit + 1).await?;
    let mut suggestions = Vec::with_capacity(users.len());

    for user in users.into_iter().filter(|u| u.id != actor).take(limit) {
        let has_parent = store.load_guardianship(user.id).await?.has_parent();
        suggestions.push(UserSuggestion {
            user_id: user.id,
            username: user.username,
            has_parent,
        });
    }

    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{LinkStatus, User};
    use crate::services::links;
    use chrono::Utc;

    async fn user(store: &MemoryStore, name: &str) -> UserId {
        store
            .insert_user(User::new(name, Utc::now()).unwrap())
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_pending_request_cannot_be_deleted() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        links::send_request(&store, parent, child).await.unwrap();

        let id = list(&store, child).await.unwrap()[0].notification.id;
        assert!(matches!(
            delete(&store, child, id).await,
            Err(AppError::InvalidState(_))
        ));

        links::respond(&store, child, id, false).await.unwrap();
        delete(&store, child, id).await.unwrap();
        assert!(list(&store, child).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_users_notifications_are_hidden() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        links::send_request(&store, parent, child).await.unwrap();
        let id = list(&store, child).await.unwrap()[0].notification.id;

        assert!(matches!(
            mark_read(&store, parent, id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete(&store, parent, id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_read_keeps_status() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        links::send_request(&store, parent, child).await.unwrap();
        let id = list(&store, child).await.unwrap()[0].notification.id;

        assert_eq!(unread_count(&store, child).await.unwrap(), 1);
        let view = mark_read(&store, child, id).await.unwrap();
        assert!(view.notification.read);
        assert_eq!(view.status, Some(LinkStatus::Pending));
        assert_eq!(unread_count(&store, child).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_suggestions_flag_supervised_accounts() {
        let store = MemoryStore::new();
        let parent = user(&store, "kidmom").await;
        let kid = user(&store, "kid_one").await;
        user(&store, "kid_two").await;

        links::send_request(&store, parent, kid).await.unwrap();
        let id = list(&store, kid).await.unwrap()[0].notification.id;
        links::respond(&store, kid, id, true).await.unwrap();

        let suggestions = username_suggestions(&store, parent, " KID ", 10).await.unwrap();
        let flags: Vec<(&str, bool)> = suggestions
            .iter()
            .map(|s| (s.username.as_str(), s.has_parent))
            .collect();
        assert_eq!(flags, vec![("kid_one", true), ("kid_two", false)]);
    }

    #[tokio::test]
    async fn test_short_query_returns_nothing() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        user(&store, "abe").await;
        assert!(username_suggestions(&store, me, "a", 10).await.unwrap().is_empty());
    }
}
