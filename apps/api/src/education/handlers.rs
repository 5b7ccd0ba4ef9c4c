use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::repository::EducationInput;
use super::service::{self, EducationUpdate};
use crate::errors::AppError;
use crate::identity::AuthUser;
use crate::models::education::EducationRow;
use crate::state::AppState;

/// GET /api/v1/education
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<EducationRow>>, AppError> {
    Ok(Json(service::list(state.education.as_ref(), user.uid()).await?))
}

/// POST /api/v1/education/add
pub async fn handle_add(
    State(state): State<AppState>,
    user: AuthUser,
    Json(entries): Json<Vec<EducationInput>>,
) -> Result<(StatusCode, Json<Vec<EducationRow>>), AppError> {
    let created = service::add(state.education.as_ref(), user.uid(), entries).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/v1/education/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(update): Json<EducationUpdate>,
) -> Result<Json<EducationRow>, AppError> {
    let row = service::update(state.education.as_ref(), user.uid(), id, update).await?;
    Ok(Json(row))
}

/// DELETE /api/v1/education/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service::delete(state.education.as_ref(), user.uid(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
