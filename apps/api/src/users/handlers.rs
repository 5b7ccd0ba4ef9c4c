use axum::{extract::State, Json};

use super::service::{self, ProfileUpdate, UserProfile};
use crate::errors::AppError;
use crate::identity::AuthUser;
use crate::state::AppState;

/// GET /api/v1/users/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = service::get_profile(state.users.as_ref(), user.uid()).await?;
    Ok(Json(profile))
}

/// PATCH /api/v1/users/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = service::update_profile(state.users.as_ref(), user.uid(), update).await?;
    Ok(Json(profile))
}
