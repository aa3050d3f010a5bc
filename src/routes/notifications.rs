use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{NotificationId, NotificationView, ParentChildLink, UserId},
    services::{
        links,
        notifications::{self, UserSuggestion},
    },
};

use super::{
    extract::{AppJson, AppPath, AppQuery},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ParentRequestBody {
    pub child_user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Vec<NotificationView>>> {
    Ok(Json(notifications::list(state.store(), me).await?))
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<CountResponse>> {
    let count = notifications::unread_count(state.store(), me).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn send_parent_request(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppJson(body): AppJson<ParentRequestBody>,
) -> AppResult<(StatusCode, Json<ParentChildLink>)> {
    let link = links::send_request(state.store(), me, body.child_user_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn respond(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(id): AppPath<NotificationId>,
    AppJson(body): AppJson<RespondBody>,
) -> AppResult<Json<NotificationView>> {
    Ok(Json(links::respond(state.store(), me, id, body.accept).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(id): AppPath<NotificationId>,
) -> AppResult<Json<NotificationView>> {
    Ok(Json(notifications::mark_read(state.store(), me, id).await?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<UpdatedResponse>> {
    let updated = notifications::mark_all_read(state.store(), me).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppPath(id): AppPath<NotificationId>,
) -> AppResult<StatusCode> {
    notifications::delete(state.store(), me, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn username_suggestions(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppQuery(params): AppQuery<SuggestionQuery>,
) -> AppResult<Json<Vec<UserSuggestion>>> {
    let suggestions =
        notifications::username_suggestions(state.store(), me, &params.query, state.suggestion_limit)
            .await?;
    Ok(Json(suggestions))
}
