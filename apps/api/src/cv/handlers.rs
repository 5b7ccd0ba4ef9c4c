use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};

use super::models::{
    AutosaveRequest, AutosaveResponse, CreateCvRequest, CreateCvResponse, CvDetail, CvListItem,
    CvOut, GenerateRequest, GenerateResponse, RenderRequest, SaveRequest, UpdateCvRequest,
    VersionOut,
};
use super::service;
use crate::errors::AppError;
use crate::identity::AuthUser;
use crate::state::AppState;

/// POST /api/v1/cv/create
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCvRequest>,
) -> Result<(StatusCode, Json<CreateCvResponse>), AppError> {
    let cv_id = service::create(state.cvs.as_ref(), user.uid(), req).await?;
    Ok((StatusCode::CREATED, Json(CreateCvResponse { cv_id })))
}

/// GET /api/v1/cv/list
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CvListItem>>, AppError> {
    Ok(Json(service::list(state.cvs.as_ref(), user.uid()).await?))
}

/// GET /api/v1/cv/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cv_id): Path<i64>,
) -> Result<Json<CvDetail>, AppError> {
    let detail = service::get(state.cvs.as_ref(), state.drafts.as_ref(), user.uid(), cv_id).await?;
    Ok(Json(detail))
}

/// PATCH /api/v1/cv/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cv_id): Path<i64>,
    Json(req): Json<UpdateCvRequest>,
) -> Result<Json<CvOut>, AppError> {
    Ok(Json(
        service::update_meta(state.cvs.as_ref(), user.uid(), cv_id, req).await?,
    ))
}

/// DELETE /api/v1/cv/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cv_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service::delete(
        state.cvs.as_ref(),
        state.drafts.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        cv_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/cv/:id/versions
pub async fn handle_versions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(cv_id): Path<i64>,
) -> Result<Json<Vec<VersionOut>>, AppError> {
    Ok(Json(service::versions(state.cvs.as_ref(), user.uid(), cv_id).await?))
}

/// GET /api/v1/cv/:id/versions/:number
pub async fn handle_version(
    State(state): State<AppState>,
    user: AuthUser,
    Path((cv_id, number)): Path<(i64, i32)>,
) -> Result<Json<VersionOut>, AppError> {
    Ok(Json(
        service::version(state.cvs.as_ref(), user.uid(), cv_id, number).await?,
    ))
}

/// POST /api/v1/cv/autosave
pub async fn handle_autosave(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AutosaveRequest>,
) -> Result<Json<AutosaveResponse>, AppError> {
    let saved =
        service::autosave(state.cvs.as_ref(), state.drafts.as_ref(), user.uid(), req).await?;
    Ok(Json(saved))
}

/// POST /api/v1/cv/save
pub async fn handle_save(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SaveRequest>,
) -> Result<Json<CvOut>, AppError> {
    let cv = service::save(state.cvs.as_ref(), state.drafts.as_ref(), user.uid(), req).await?;
    Ok(Json(cv))
}

/// POST /api/v1/cv/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let url = service::generate(&state, user.uid(), req).await?;
    Ok(Json(GenerateResponse { url }))
}

/// POST /api/v1/cv/render
pub async fn handle_render(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RenderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let html = service::render(&state, user.uid(), req).await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Html(html)))
}
