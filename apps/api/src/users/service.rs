use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::repository::{ProfileChanges, UserRepository};
use crate::errors::AppError;
use crate::models::user::UserRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub username: String,
    pub full_name: Option<String>,
    pub email: String,
    pub img: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(user: UserRow) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            img: user.img,
            address: user.address,
            phone: user.phone,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub img: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

pub fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

pub async fn get_profile(users: &dyn UserRepository, uid: &str) -> Result<UserProfile, AppError> {
    users
        .find_by_uid(uid)
        .await?
        .map(UserProfile::from)
        .ok_or_else(user_not_found)
}

pub async fn update_profile(
    users: &dyn UserRepository,
    uid: &str,
    update: ProfileUpdate,
) -> Result<UserProfile, AppError> {
    let current = users.find_by_uid(uid).await?.ok_or_else(user_not_found)?;
    debug!("Updating profile of {uid}");

    let username = match update.username.map(|u| u.trim().to_string()) {
        Some(name) if name.is_empty() => {
            return Err(AppError::Validation("Username cannot be empty".into()))
        }
        Some(name) if name == current.username => None,
        Some(name) => {
            if users.find_by_username(&name).await?.is_some() {
                return Err(AppError::Conflict("Username is unavailable".into()));
            }
            Some(name)
        }
        None => None,
    };

    let changes = ProfileChanges {
        username,
        full_name: update.full_name,
        img: update.img,
        address: update.address,
        phone: update.phone.as_deref().map(normalize_phone).transpose()?,
    };

    if changes.is_empty() {
        return Ok(current.into());
    }

    users
        .update_profile(uid, changes)
        .await?
        .map(UserProfile::from)
        .ok_or_else(user_not_found)
}

/// Normalizes a phone number to `+<digits>`.
///
/// Spaces, dashes, dots and parentheses are ignored. The number must start
/// with `+` and carry 10 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let Some(digits) = compact.strip_prefix('+') else {
        return Err(AppError::Validation("Invalid phone number format".into()));
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("Invalid phone number".into()));
    }
    if !(10..=15).contains(&digits.len()) {
        return Err(AppError::Validation("Invalid phone number format".into()));
    }
    Ok(compact)
}
