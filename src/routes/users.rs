use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::{error::AppResult, models::User, services::users};

use super::{extract::AppJson, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

/// Registers a username; credentials are issued elsewhere
pub async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = users::register(state.store(), &body.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
