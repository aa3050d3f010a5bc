use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::{AppError, AppResult};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 30;

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a user after validating and normalizing the username
    pub fn new(username: &str, now: DateTime<Utc>) -> AppResult<Self> {
        Ok(Self {
            id: UserId::new(),
            username: normalize_username(username)?,
            created_at: now,
        })
    }
}

/// Lowercases a username and checks its length and alphabet
pub fn normalize_username(raw: &str) -> AppResult<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();

    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(AppError::InvalidInput(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err(AppError::InvalidInput(
            "Username may only contain letters, digits, '_' and '.'".to_string(),
        ));
    }

    Ok(username)
}
