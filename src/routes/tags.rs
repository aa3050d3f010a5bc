use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::TagKind,
    services::tags::{self, TagsView},
};

use super::{
    extract::{AppJson, AppPath},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub tags: Vec<String>,
}

pub async fn get_tags(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(kind): AppPath<TagKind>,
) -> AppResult<Json<TagsView>> {
    Ok(Json(tags::get_tags(state.store(), me, me, kind).await?))
}

pub async fn add_tag(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(kind): AppPath<TagKind>,
    AppJson(body): AppJson<TagRequest>,
) -> AppResult<Json<TagsView>> {
    Ok(Json(tags::add_tag(state.store(), me, me, &body.tag, kind).await?))
}

pub async fn remove_tag(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(kind): AppPath<TagKind>,
    AppJson(body): AppJson<TagRequest>,
) -> AppResult<Json<TagsView>> {
    Ok(Json(tags::remove_tag(state.store(), me, me, &body.tag, kind).await?))
}

/// Folds the tags of watched content into the caller's interests
pub async fn record_interaction(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppJson(body): AppJson<InteractionRequest>,
) -> AppResult<Json<TagsView>> {
    Ok(Json(tags::record_interaction(state.store(), me, &body.tags).await?))
}
