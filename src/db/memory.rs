use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{GuardianshipEdit, ProfileEdit, Store};
use crate::error::{AppError, AppResult};
use crate::models::{
    ContentItem, GuardedProfile, Guardianship, LinkId, LinkStatus, Notification, NotificationId,
    NotificationView, ParentChildLink, TagSet, User, UserId, UserTagProfile,
};

/// In-process store backed by hash maps behind a single lock
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, User>,
    profiles: HashMap<UserId, UserTagProfile>,
    /// Links keyed by child
    links: HashMap<UserId, Vec<ParentChildLink>>,
    notifications: HashMap<NotificationId, Notification>,
    content: Vec<ContentItem>,
}

impl MemoryStoreInner {
    fn require_user(&self, id: UserId) -> AppResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User {} not found", id)))
        }
    }

    fn link_status(&self, link_id: Option<LinkId>) -> Option<LinkStatus> {
        let link_id = link_id?;
        self.links
            .values()
            .flatten()
            .find(|l| l.id == link_id)
            .map(|l| l.status)
    }

    fn active_parent(&self, child_id: UserId) -> Option<UserId> {
        self.links
            .get(&child_id)
            .and_then(|links| links.iter().find(|l| l.is_active()))
            .map(|l| l.parent_id)
    }

    fn view(&self, notification: &Notification) -> NotificationView {
        notification
            .clone()
            .into_view(self.link_status(notification.link_id))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn search_users(&self, prefix: &str, limit: usize) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.username.starts_with(prefix))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.truncate(limit);
        Ok(users)
    }

    async fn load_profile(&self, user_id: UserId) -> AppResult<GuardedProfile> {
        let inner = self.inner.read().await;
        inner.require_user(user_id)?;
        Ok(GuardedProfile {
            profile: inner
                .profiles
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| UserTagProfile::new(user_id)),
            active_parent: inner.active_parent(user_id),
        })
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        edit: ProfileEdit,
    ) -> AppResult<GuardedProfile> {
        let mut inner = self.inner.write().await;
        inner.require_user(user_id)?;

        let active_parent = inner.active_parent(user_id);
        let mut profile = inner
            .profiles
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserTagProfile::new(user_id));

        edit(&mut profile, active_parent)?;

        inner.profiles.insert(user_id, profile.clone());
        Ok(GuardedProfile {
            profile,
            active_parent,
        })
    }

    async fn load_guardianship(&self, child_id: UserId) -> AppResult<Guardianship> {
        let inner = self.inner.read().await;
        inner.require_user(child_id)?;
        let links = inner.links.get(&child_id).cloned().unwrap_or_default();
        Ok(Guardianship::new(child_id, links))
    }

    async fn update_guardianship(
        &self,
        child_id: UserId,
        edit: GuardianshipEdit,
    ) -> AppResult<Guardianship> {
        let mut inner = self.inner.write().await;
        inner.require_user(child_id)?;

        let links = inner.links.get(&child_id).cloned().unwrap_or_default();
        let mut guardianship = Guardianship::new(child_id, links);

        let notifications = edit(&mut guardianship)?;

        inner.links.insert(child_id, guardianship.links.clone());
        for notification in notifications {
            inner.notifications.insert(notification.id, notification);
        }
        Ok(guardianship)
    }

    async fn active_children(&self, parent_id: UserId) -> AppResult<Vec<ParentChildLink>> {
        let inner = self.inner.read().await;
        let mut links: Vec<ParentChildLink> = inner
            .links
            .values()
            .flatten()
            .filter(|l| l.parent_id == parent_id && l.is_active())
            .cloned()
            .collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(links)
    }

    async fn list_notifications(&self, recipient_id: UserId) -> AppResult<Vec<NotificationView>> {
        let inner = self.inner.read().await;
        let mut views: Vec<NotificationView> = inner
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .map(|n| inner.view(n))
            .collect();
        views.sort_by(|a, b| b.notification.created_at.cmp(&a.notification.created_at));
        Ok(views)
    }

    async fn get_notification(&self, id: NotificationId) -> AppResult<Option<NotificationView>> {
        let inner = self.inner.read().await;
        Ok(inner.notifications.get(&id).map(|n| inner.view(n)))
    }

    async fn unread_count(&self, recipient_id: UserId) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let notification = inner
            .notifications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for notification in inner.notifications.values_mut() {
            if notification.recipient_id == recipient_id && !notification.read {
                notification.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_notification(&self, id: NotificationId) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .notifications
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    async fn insert_content(&self, item: ContentItem) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_user(item.owner_id)?;
        inner.content.push(item);
        Ok(())
    }

    async fn recent_content(&self, exclude: &TagSet, limit: usize) -> AppResult<Vec<ContentItem>> {
        let inner = self.inner.read().await;
        let mut items: Vec<ContentItem> = inner
            .content
            .iter()
            .filter(|item| !item.tags.intersects(exclude))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(limit);
        Ok(items)
    }
}
