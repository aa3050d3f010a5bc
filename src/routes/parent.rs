use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{ParentChildLink, TagKind, UserId},
    services::{
        links::{self, ChildSummary},
        tags::{self, ChildTagsView, TagsView},
    },
};

use super::{
    extract::{AppJson, AppPath},
    AppState,
};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
pub struct ExcludedTagRequest {
    pub tag: String,
    pub action: TagAction,
}

pub async fn children(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Vec<ChildSummary>>> {
    Ok(Json(links::children(state.store(), me).await?))
}

pub async fn child_tags(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(child_id): AppPath<UserId>,
) -> AppResult<Json<ChildTagsView>> {
    Ok(Json(tags::get_child_tags(state.store(), me, child_id).await?))
}

/// Adds or removes one of a supervised child's excluded tags
pub async fn update_excluded_tags(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(child_id): AppPath<UserId>,
    AppJson(body): AppJson<ExcludedTagRequest>,
) -> AppResult<Json<TagsView>> {
    let store = state.store();
    let view = match body.action {
        TagAction::Add => tags::add_tag(store, me, child_id, &body.tag, TagKind::Exclude).await?,
        TagAction::Remove => {
            tags::remove_tag(store, me, child_id, &body.tag, TagKind::Exclude).await?
        }
    };
    Ok(Json(view))
}

pub async fn unlink_child(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(child_id): AppPath<UserId>,
) -> AppResult<Json<ParentChildLink>> {
    Ok(Json(links::unlink_child(state.store(), me, child_id).await?))
}

/// Either party of an active link may remove it
pub async fn unlink(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(other_id): AppPath<UserId>,
) -> AppResult<Json<ParentChildLink>> {
    Ok(Json(links::unlink(state.store(), me, other_id).await?))
}
