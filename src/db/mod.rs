use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    ContentItem, GuardedProfile, Guardianship, Notification, NotificationId, NotificationView,
    ParentChildLink, TagSet, User, UserId, UserTagProfile,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Edit applied to a tag profile inside the store's unit of work.
///
/// Receives the user's currently active parent, if any.
pub type ProfileEdit = Box<dyn FnOnce(&mut UserTagProfile, Option<UserId>) -> AppResult<()> + Send>;

/// Edit applied to a child's links inside the store's unit of work.
///
/// Returns notifications to persist alongside the link changes.
pub type GuardianshipEdit = Box<dyn FnOnce(&mut Guardianship) -> AppResult<Vec<Notification>> + Send>;

/// Persistence for users, tag profiles, links, notifications and content
///
/// Mutations take an edit closure so the domain rules run against freshly
/// loaded state while the store holds its lock or transaction. A failing
/// edit leaves the store untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a user; fails with `Conflict` if the username is taken
    async fn insert_user(&self, user: User) -> AppResult<User>;

    async fn get_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Users whose username starts with `prefix`, ordered by username
    async fn search_users(&self, prefix: &str, limit: usize) -> AppResult<Vec<User>>;

    /// Loads a profile and its active parent; a user who never set tags
    /// gets an empty profile
    async fn load_profile(&self, user_id: UserId) -> AppResult<GuardedProfile>;

    /// Atomically applies `edit` to a user's profile and returns the result
    async fn update_profile(&self, user_id: UserId, edit: ProfileEdit)
        -> AppResult<GuardedProfile>;

    async fn load_guardianship(&self, child_id: UserId) -> AppResult<Guardianship>;

    /// Atomically applies `edit` to a child's links and stores the
    /// notifications it generates
    async fn update_guardianship(
        &self,
        child_id: UserId,
        edit: GuardianshipEdit,
    ) -> AppResult<Guardianship>;

    /// Active links in which `parent_id` is the parent
    async fn active_children(&self, parent_id: UserId) -> AppResult<Vec<ParentChildLink>>;

    /// Notifications for a recipient, newest first
    async fn list_notifications(&self, recipient_id: UserId) -> AppResult<Vec<NotificationView>>;

    async fn get_notification(&self, id: NotificationId) -> AppResult<Option<NotificationView>>;

    async fn unread_count(&self, recipient_id: UserId) -> AppResult<u64>;

    async fn mark_read(&self, id: NotificationId) -> AppResult<()>;

    /// Marks every notification of a recipient as read, returning how many changed
    async fn mark_all_read(&self, recipient_id: UserId) -> AppResult<u64>;

    async fn delete_notification(&self, id: NotificationId) -> AppResult<()>;

    async fn insert_content(&self, item: ContentItem) -> AppResult<()>;

    /// Most recent content items carrying none of the `exclude` tags
    async fn recent_content(&self, exclude: &TagSet, limit: usize) -> AppResult<Vec<ContentItem>>;
}
