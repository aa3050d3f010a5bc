use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use uuid::Uuid;

use super::{GuardianshipEdit, ProfileEdit, Store};
use crate::error::{AppError, AppResult};
use crate::models::{
    ContentItem, GuardedProfile, Guardianship, LinkStatus, Notification, NotificationId,
    NotificationView, ParentChildLink, TagSet, User, UserId, UserTagProfile,
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id.into(),
            username: row.username,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    include_tags: Vec<String>,
    exclude_tags: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    parent_id: Uuid,
    child_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    unlinked_at: Option<DateTime<Utc>>,
}

impl TryFrom<LinkRow> for ParentChildLink {
    type Error = AppError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(ParentChildLink {
            id: row.id.into(),
            parent_id: row.parent_id.into(),
            child_id: row.child_id.into(),
            status: row.status.parse()?,
            created_at: row.created_at,
            responded_at: row.responded_at,
            unlinked_at: row.unlinked_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    sender_id: Uuid,
    kind: String,
    link_id: Option<Uuid>,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
    link_status: Option<String>,
}

impl TryFrom<NotificationRow> for NotificationView {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let link_status: Option<LinkStatus> =
            row.link_status.as_deref().map(str::parse).transpose()?;
        let notification = Notification {
            id: row.id.into(),
            recipient_id: row.recipient_id.into(),
            sender_id: row.sender_id.into(),
            kind: row.kind.parse()?,
            link_id: row.link_id.map(Into::into),
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        };
        Ok(notification.into_view(link_status))
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    tags: Vec<String>,
    published_at: DateTime<Utc>,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        ContentItem {
            id: row.id.into(),
            owner_id: row.owner_id.into(),
            title: row.title,
            tags: TagSet::from_strings(row.tags),
            published_at: row.published_at,
        }
    }
}

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.recipient_id, n.sender_id, n.kind, n.link_id, n.message, n.read,
           n.created_at, l.status AS link_status
    FROM notifications n
    LEFT JOIN parent_links l ON l.id = n.link_id
"#;

/// Escapes LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Store backed by PostgreSQL
///
/// Each mutation runs in a transaction that first locks the affected user row,
/// serializing tag edits and link transitions for that user.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending migrations from `migrations/`
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    async fn lock_user(conn: &mut PgConnection, id: UserId) -> AppResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(conn)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn fetch_profile(conn: &mut PgConnection, user_id: UserId) -> AppResult<UserTagProfile> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT include_tags, exclude_tags FROM tag_profiles WHERE user_id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(conn)
        .await?;

        Ok(match row {
            Some(row) => UserTagProfile {
                user_id,
                include_tags: TagSet::from_strings(row.include_tags),
                exclude_tags: TagSet::from_strings(row.exclude_tags),
            },
            None => UserTagProfile::new(user_id),
        })
    }

    async fn fetch_links(conn: &mut PgConnection, child_id: UserId) -> AppResult<Vec<ParentChildLink>> {
        sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, parent_id, child_id, status, created_at, responded_at, unlinked_at
            FROM parent_links
            WHERE child_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(child_id.0)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(ParentChildLink::try_from)
        .collect()
    }

    async fn fetch_active_parent(
        conn: &mut PgConnection,
        child_id: UserId,
    ) -> AppResult<Option<UserId>> {
        let parent = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT parent_id FROM parent_links
            WHERE child_id = $1 AND status = 'ACCEPTED' AND unlinked_at IS NULL
            "#,
        )
        .bind(child_id.0)
        .fetch_optional(conn)
        .await?;
        Ok(parent.map(UserId::from))
    }

    async fn user_exists(&self, id: UserId) -> AppResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: User) -> AppResult<User> {
        let result = sqlx::query("INSERT INTO users (id, username, created_at) VALUES ($1, $2, $3)")
            .bind(user.id.0)
            .bind(&user.username)
            .bind(user.created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("Username {} is already taken", user.username),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn search_users(&self, prefix: &str, limit: usize) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, created_at
            FROM users
            WHERE username LIKE $1 || '%'
            ORDER BY username
            LIMIT $2
            "#,
        )
        .bind(escape_like(prefix))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn load_profile(&self, user_id: UserId) -> AppResult<GuardedProfile> {
        self.user_exists(user_id).await?;
        let mut conn = self.pool.acquire().await?;
        let profile = Self::fetch_profile(&mut conn, user_id).await?;
        let active_parent = Self::fetch_active_parent(&mut conn, user_id).await?;
        Ok(GuardedProfile {
            profile,
            active_parent,
        })
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        edit: ProfileEdit,
    ) -> AppResult<GuardedProfile> {
        let mut tx = self.pool.begin().await?;
        Self::lock_user(&mut tx, user_id).await?;

        let active_parent = Self::fetch_active_parent(&mut tx, user_id).await?;

        let mut profile = Self::fetch_profile(&mut tx, user_id).await?;
        edit(&mut profile, active_parent)?;

        sqlx::query(
            r#"
            INSERT INTO tag_profiles (user_id, include_tags, exclude_tags, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id) DO UPDATE
            SET include_tags = EXCLUDED.include_tags,
                exclude_tags = EXCLUDED.exclude_tags,
                updated_at = now()
            "#,
        )
        .bind(user_id.0)
        .bind(profile.include_tags.to_strings())
        .bind(profile.exclude_tags.to_strings())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(GuardedProfile {
            profile,
            active_parent,
        })
    }

    async fn load_guardianship(&self, child_id: UserId) -> AppResult<Guardianship> {
        self.user_exists(child_id).await?;
        let mut conn = self.pool.acquire().await?;
        let links = Self::fetch_links(&mut conn, child_id).await?;
        Ok(Guardianship::new(child_id, links))
    }

    async fn update_guardianship(
        &self,
        child_id: UserId,
        edit: GuardianshipEdit,
    ) -> AppResult<Guardianship> {
        let mut tx = self.pool.begin().await?;
        Self::lock_user(&mut tx, child_id).await?;

        let before = Self::fetch_links(&mut tx, child_id).await?;
        let mut guardianship = Guardianship::new(child_id, before.clone());
        let notifications = edit(&mut guardianship)?;

        for link in guardianship.links.iter().filter(|l| !before.contains(l)) {
            sqlx::query(
                r#"
                INSERT INTO parent_links
                    (id, parent_id, child_id, status, created_at, responded_at, unlinked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                SET status = EXCLUDED.status,
                    responded_at = EXCLUDED.responded_at,
                    unlinked_at = EXCLUDED.unlinked_at
                "#,
            )
            .bind(link.id.0)
            .bind(link.parent_id.0)
            .bind(link.child_id.0)
            .bind(link.status.as_str())
            .bind(link.created_at)
            .bind(link.responded_at)
            .bind(link.unlinked_at)
            .execute(&mut *tx)
            .await?;
        }

        for notification in &notifications {
            sqlx::query(
                r#"
                INSERT INTO notifications
                    (id, recipient_id, sender_id, kind, link_id, message, read, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(notification.id.0)
            .bind(notification.recipient_id.0)
            .bind(notification.sender_id.0)
            .bind(notification.kind.as_str())
            .bind(notification.link_id.map(|id| id.0))
            .bind(&notification.message)
            .bind(notification.read)
            .bind(notification.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(guardianship)
    }

    async fn active_children(&self, parent_id: UserId) -> AppResult<Vec<ParentChildLink>> {
        sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, parent_id, child_id, status, created_at, responded_at, unlinked_at
            FROM parent_links
            WHERE parent_id = $1 AND status = 'ACCEPTED' AND unlinked_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(parent_id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ParentChildLink::try_from)
        .collect()
    }

    async fn list_notifications(&self, recipient_id: UserId) -> AppResult<Vec<NotificationView>> {
        let sql = format!(
            "{} WHERE n.recipient_id = $1 ORDER BY n.created_at DESC",
            NOTIFICATION_SELECT
        );
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(recipient_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(NotificationView::try_from)
            .collect()
    }

    async fn get_notification(&self, id: NotificationId) -> AppResult<Option<NotificationView>> {
        let sql = format!("{} WHERE n.id = $1", NOTIFICATION_SELECT);
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(NotificationView::try_from)
            .transpose()
    }

    async fn unread_count(&self, recipient_id: UserId) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT read",
        )
        .bind(recipient_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND NOT read")
                .bind(recipient_id.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: NotificationId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    async fn insert_content(&self, item: ContentItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO content_items (id, owner_id, title, tags, published_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.0)
        .bind(item.owner_id.0)
        .bind(&item.title)
        .bind(item.tags.to_strings())
        .bind(item.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_content(&self, exclude: &TagSet, limit: usize) -> AppResult<Vec<ContentItem>> {
        let rows = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, owner_id, title, tags, published_at
            FROM content_items
            WHERE NOT (tags && $1)
            ORDER BY published_at DESC
            LIMIT $2
            "#,
        )
        .bind(exclude.to_strings())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ContentItem::from).collect())
    }
}
