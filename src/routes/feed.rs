use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::AuthUser,
    models::{ContentItem, FeedEntry},
    services::feed,
};

use super::{extract::AppJson, AppState};

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn get_feed(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Vec<FeedEntry>>> {
    Ok(Json(feed::get_user_feed(state.store(), me, state.feed_limits).await?))
}

pub async fn publish(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    AppJson(body): AppJson<PublishRequest>,
) -> AppResult<(StatusCode, Json<ContentItem>)> {
    let item = feed::publish(state.store(), me, &body.title, &body.tags).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
