use serde::{Deserialize, Serialize};

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{FeedFilter, Tag, TagKind, TagSet, UserId, UserTagProfile},
};

/// Whether an operation reads or changes a tag set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Decides whether `actor` may access `target`'s tag set of `kind`.
///
/// Include tags are only ever written by their owner. Exclude tags are
/// written by the owner while no parent is linked, and only by that parent
/// while one is. The owner and the active parent may both read.
pub fn authorize(
    actor: UserId,
    target: UserId,
    kind: TagKind,
    access: Access,
    active_parent: Option<UserId>,
) -> AppResult<()> {
    let is_self = actor == target;
    let is_parent = active_parent == Some(actor);

    let allowed = match (access, kind) {
        (Access::Read, _) => is_self || is_parent,
        (Access::Write, TagKind::Include) => is_self,
        (Access::Write, TagKind::Exclude) => match active_parent {
            Some(_) => is_parent,
            None => is_self,
        },
    };

    if allowed {
        return Ok(());
    }

    let reason = match (access, kind, active_parent) {
        (Access::Write, TagKind::Exclude, Some(_)) if is_self => {
            "Excluded tags are managed by your parent account".to_string()
        }
        (Access::Write, TagKind::Exclude, None) if !is_self => {
            "This account has no linked parent; only its owner can change excluded tags"
                .to_string()
        }
        _ => format!("Not allowed to {} this user's {} tags", access.verb(), kind),
    };

    tracing::warn!(
        actor = %actor,
        target = %target,
        kind = %kind,
        "Tag authority check failed"
    );
    Err(AppError::Authority(reason))
}

impl Access {
    fn verb(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "change",
        }
    }
}

/// One tag set as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagsView {
    pub kind: TagKind,
    pub tags: TagSet,
    /// Whether a parent currently owns the exclude set
    pub has_parent: bool,
}

impl TagsView {
    fn new(profile: &UserTagProfile, kind: TagKind, has_parent: bool) -> Self {
        Self {
            kind,
            tags: profile.tags(kind).clone(),
            has_parent,
        }
    }
}

/// Both tag sets of a supervised account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildTagsView {
    pub user_id: UserId,
    pub include_tags: TagSet,
    pub exclude_tags: TagSet,
    pub has_parent: bool,
}

/// Returns one of `target`'s tag sets
pub async fn get_tags(
    store: &dyn Store,
    actor: UserId,
    target: UserId,
    kind: TagKind,
) -> AppResult<TagsView> {
    let guarded = store.load_profile(target).await?;
    authorize(actor, target, kind, Access::Read, guarded.active_parent)?;
    Ok(TagsView::new(&guarded.profile, kind, guarded.has_parent()))
}

/// Returns both of a child's tag sets to its active parent
pub async fn get_child_tags(
    store: &dyn Store,
    parent: UserId,
    child: UserId,
) -> AppResult<ChildTagsView> {
    let guarded = store.load_profile(child).await?;
    if guarded.active_parent != Some(parent) {
        return Err(AppError::Authority(
            "You are not the parent of this account".to_string(),
        ));
    }

    Ok(ChildTagsView {
        user_id: child,
        has_parent: true,
        include_tags: guarded.profile.include_tags,
        exclude_tags: guarded.profile.exclude_tags,
    })
}

/// Adds a tag to `target`'s set; adding an existing tag succeeds unchanged
pub async fn add_tag(
    store: &dyn Store,
    actor: UserId,
    target: UserId,
    raw_tag: &str,
    kind: TagKind,
) -> AppResult<TagsView> {
    let tag = Tag::parse(raw_tag)?;

    let guarded = store
        .update_profile(
            target,
            Box::new(move |profile: &mut UserTagProfile, active_parent: Option<UserId>| {
                authorize(actor, target, kind, Access::Write, active_parent)?;
                if profile.add_tag(kind, tag.clone()) {
                    tracing::info!(actor = %actor, target = %target, kind = %kind, tag = %tag, "Tag added");
                }
                Ok(())
            }),
        )
        .await?;

    Ok(TagsView::new(&guarded.profile, kind, guarded.has_parent()))
}

/// Removes a tag from `target`'s set; removing an absent tag succeeds
pub async fn remove_tag(
    store: &dyn Store,
    actor: UserId,
    target: UserId,
    raw_tag: &str,
    kind: TagKind,
) -> AppResult<TagsView> {
    let tag = Tag::parse(raw_tag)?;

    let guarded = store
        .update_profile(
            target,
            Box::new(move |profile: &mut UserTagProfile, active_parent: Option<UserId>| {
                authorize(actor, target, kind, Access::Write, active_parent)?;
                if profile.remove_tag(kind, &tag) {
                    tracing::info!(actor = %actor, target = %target, kind = %kind, tag = %tag, "Tag removed");
                }
                Ok(())
            }),
        )
        .await?;

    Ok(TagsView::new(&guarded.profile, kind, guarded.has_parent()))
}

/// Adds the tags of watched content to the user's interests.
///
/// Tags the user currently excludes, and tags that do not normalize to a
/// valid tag, are skipped rather than rejected.
pub async fn record_interaction(
    store: &dyn Store,
    user: UserId,
    raw_tags: &[String],
) -> AppResult<TagsView> {
    let tags: Vec<Tag> = raw_tags.iter().filter_map(|raw| Tag::parse(raw).ok()).collect();

    let guarded = store
        .update_profile(
            user,
            Box::new(move |profile: &mut UserTagProfile, _: Option<UserId>| {
                let added = profile.absorb_interests(tags);
                tracing::debug!(user = %user, added = added.len(), "Interaction tags recorded");
                Ok(())
            }),
        )
        .await?;

    Ok(TagsView::new(
        &guarded.profile,
        TagKind::Include,
        guarded.has_parent(),
    ))
}

/// Read-only snapshot of a user's tag sets for feed building
pub async fn derive_feed_filter(store: &dyn Store, user: UserId) -> AppResult<FeedFilter> {
    let guarded = store.load_profile(user).await?;
    Ok(guarded.profile.feed_filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{Guardianship, User};
    use chrono::Utc;
    use tokio_test::assert_ok;

    async fn user(store: &MemoryStore, name: &str) -> UserId {
        store
            .insert_user(User::new(name, Utc::now()).unwrap())
            .await
            .unwrap()
            .id
    }

    async fn link(store: &MemoryStore, parent: UserId, child: UserId) {
        store
            .update_guardianship(
                child,
                Box::new(move |g: &mut Guardianship| {
                    let link = g.request(parent, Utc::now())?;
                    g.respond(link.id, child, true, Utc::now())?;
                    Ok(Vec::new())
                }),
            )
            .await
            .unwrap();
    }

    async fn unlink(store: &MemoryStore, parent: UserId, child: UserId) {
        store
            .update_guardianship(
                child,
                Box::new(move |g: &mut Guardianship| {
                    g.unlink(parent, child, Utc::now())?;
                    Ok(Vec::new())
                }),
            )
            .await
            .unwrap();
    }

    fn names(view: &TagsView) -> Vec<String> {
        view.tags.to_strings()
    }

    #[test]
    fn test_authorize_matrix() {
        let (me, parent, stranger) = (UserId::new(), UserId::new(), UserId::new());

        assert!(authorize(me, me, TagKind::Include, Access::Write, None).is_ok());
        assert!(authorize(me, me, TagKind::Include, Access::Write, Some(parent)).is_ok());
        assert!(authorize(parent, me, TagKind::Include, Access::Write, Some(parent)).is_err());

        assert!(authorize(me, me, TagKind::Exclude, Access::Write, None).is_ok());
        assert!(authorize(me, me, TagKind::Exclude, Access::Write, Some(parent)).is_err());
        assert!(authorize(parent, me, TagKind::Exclude, Access::Write, Some(parent)).is_ok());
        assert!(authorize(parent, me, TagKind::Exclude, Access::Write, None).is_err());

        assert!(authorize(parent, me, TagKind::Include, Access::Read, Some(parent)).is_ok());
        assert!(authorize(stranger, me, TagKind::Exclude, Access::Read, Some(parent)).is_err());
    }

    #[tokio::test]
    async fn test_add_include_twice_is_idempotent() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;

        let once = add_tag(&store, me, me, "music", TagKind::Include).await.unwrap();
        let twice = add_tag(&store, me, me, "music", TagKind::Include).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(names(&twice), vec!["music"]);
    }

    #[tokio::test]
    async fn test_normalization_and_case_duplicates() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;

        let view = add_tag(&store, me, me, "  Comedy  ", TagKind::Include).await.unwrap();
        assert_eq!(names(&view), vec!["comedy"]);

        let view = add_tag(&store, me, me, "COMEDY", TagKind::Include).await.unwrap();
        assert_eq!(view.tags.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_tag_rejected() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        assert!(matches!(
            add_tag(&store, me, me, "   ", TagKind::Include).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupervised_user_manages_own_excludes() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        add_tag(&store, me, me, "horror", TagKind::Exclude).await.unwrap();

        let view = add_tag(&store, me, me, "gaming", TagKind::Exclude).await.unwrap();
        assert!(!view.has_parent);
        assert_eq!(names(&view), vec!["gaming", "horror"]);

        let fetched = get_tags(&store, me, me, TagKind::Exclude).await.unwrap();
        assert_eq!(fetched, view);
    }

    #[tokio::test]
    async fn test_supervised_child_cannot_touch_excludes() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        add_tag(&store, child, child, "cartoons", TagKind::Exclude).await.unwrap();
        link(&store, parent, child).await;

        let before = get_tags(&store, child, child, TagKind::Exclude).await.unwrap();
        assert!(before.has_parent);

        assert!(matches!(
            add_tag(&store, child, child, "violence", TagKind::Exclude).await,
            Err(AppError::Authority(_))
        ));
        assert!(matches!(
            remove_tag(&store, child, child, "cartoons", TagKind::Exclude).await,
            Err(AppError::Authority(_))
        ));

        let after = get_tags(&store, child, child, TagKind::Exclude).await.unwrap();
        assert_eq!(before, after);

        // Include tags stay self-managed
        assert_ok!(add_tag(&store, child, child, "science", TagKind::Include).await);
    }

    #[tokio::test]
    async fn test_parent_manages_child_excludes() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        link(&store, parent, child).await;

        let view = add_tag(&store, parent, child, "violence", TagKind::Exclude)
            .await
            .unwrap();
        assert_eq!(names(&view), vec!["violence"]);

        assert!(matches!(
            add_tag(&store, parent, child, "toys", TagKind::Include).await,
            Err(AppError::Authority(_))
        ));

        let child_view = get_child_tags(&store, parent, child).await.unwrap();
        assert_eq!(child_view.exclude_tags.to_strings(), vec!["violence"]);

        let view = remove_tag(&store, parent, child, "violence", TagKind::Exclude)
            .await
            .unwrap();
        assert!(view.tags.is_empty());
    }

    #[tokio::test]
    async fn test_unlink_returns_authority_to_child() {
        let store = MemoryStore::new();
        let parent = user(&store, "parent").await;
        let child = user(&store, "child").await;
        link(&store, parent, child).await;
        add_tag(&store, parent, child, "violence", TagKind::Exclude)
            .await
            .unwrap();

        unlink(&store, parent, child).await;

        let view = add_tag(&store, child, child, "gaming", TagKind::Exclude).await.unwrap();
        assert!(!view.has_parent);
        assert_eq!(names(&view), vec!["gaming", "violence"]);

        assert!(matches!(
            add_tag(&store, parent, child, "news", TagKind::Exclude).await,
            Err(AppError::Authority(_))
        ));
        assert!(matches!(
            get_child_tags(&store, parent, child).await,
            Err(AppError::Authority(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_absent_tag_succeeds() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        let view = remove_tag(&store, me, me, "nothing", TagKind::Include).await.unwrap();
        assert!(view.tags.is_empty());
    }

    #[tokio::test]
    async fn test_stranger_cannot_read_tags() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        let stranger = user(&store, "mallory").await;
        assert!(matches!(
            get_tags(&store, stranger, me, TagKind::Include).await,
            Err(AppError::Authority(_))
        ));
    }

    #[tokio::test]
    async fn test_record_interaction_skips_excluded() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;
        add_tag(&store, me, me, "gore", TagKind::Exclude).await.unwrap();

        let view = record_interaction(
            &store,
            me,
            &["Horror".to_string(), "gore".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(names(&view), vec!["horror"]);

        let filter = derive_feed_filter(&store, me).await.unwrap();
        assert_eq!(filter.exclude_tags.to_strings(), vec!["gore"]);
        assert_eq!(filter.include_tags.to_strings(), vec!["horror"]);
    }

    #[tokio::test]
    async fn test_record_interaction_skips_invalid_tags() {
        let store = MemoryStore::new();
        let me = user(&store, "alice").await;

        let view = record_interaction(
            &store,
            me,
            &["   ".to_string(), "Mystery".to_string(), "x".repeat(200)],
        )
        .await
        .unwrap();
        assert_eq!(names(&view), vec!["mystery"]);
    }
}
