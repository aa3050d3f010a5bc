use chrono::Utc;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{User, UserId},
};

/// Registers a new account under a unique username
pub async fn register(store: &dyn Store, username: &str) -> AppResult<User> {
    let user = User::new(username, Utc::now())?;
    let user = store.insert_user(user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

/// Resolves an authenticated subject to an existing account
pub async fn resolve(store: &dyn Store, id: UserId) -> AppResult<User> {
    store
        .get_user(id)
        .await?
        .ok_or(AppError::Unauthenticated)
}
