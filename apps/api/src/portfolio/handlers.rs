use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use super::models::{
    CreatePortfolioRequest, CreatePortfolioResponse, PortfolioAutosaveRequest, PortfolioDetail,
    PortfolioListItem, PortfolioOut, PublicPortfolio,
};
use super::service::{self, PortfolioUpdate};
use crate::cv::models::AutosaveResponse;
use crate::errors::AppError;
use crate::forms::FormFields;
use crate::identity::AuthUser;
use crate::state::AppState;

/// POST /api/v1/portfolio/create
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePortfolioRequest>,
) -> Result<(StatusCode, Json<CreatePortfolioResponse>), AppError> {
    let portfolio_id = service::create(state.portfolios.as_ref(), user.uid(), &req.theme).await?;
    Ok((StatusCode::CREATED, Json(CreatePortfolioResponse { portfolio_id })))
}

/// GET /api/v1/portfolio/list
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PortfolioListItem>>, AppError> {
    Ok(Json(service::list(state.portfolios.as_ref(), user.uid()).await?))
}

/// GET /api/v1/portfolio/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PortfolioDetail>, AppError> {
    let detail = service::get(
        state.portfolios.as_ref(),
        state.drafts.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        id,
    )
    .await?;
    Ok(Json(detail))
}

/// PATCH /api/v1/portfolio/update
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<PortfolioDetail>, AppError> {
    let mut form = FormFields::read(multipart).await?;
    let update = PortfolioUpdate::from_form(&mut form)?;
    let detail = service::update(
        state.portfolios.as_ref(),
        state.drafts.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        update,
    )
    .await?;
    Ok(Json(detail))
}

/// POST /api/v1/portfolio/autosave
pub async fn handle_autosave(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PortfolioAutosaveRequest>,
) -> Result<Json<AutosaveResponse>, AppError> {
    let saved =
        service::autosave(state.portfolios.as_ref(), state.drafts.as_ref(), user.uid(), req)
            .await?;
    Ok(Json(saved))
}

/// DELETE /api/v1/portfolio/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    service::delete(
        state.portfolios.as_ref(),
        state.drafts.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/portfolio/:id/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PortfolioOut>, AppError> {
    let out =
        service::publish(state.portfolios.as_ref(), state.storage.as_ref(), user.uid(), id).await?;
    Ok(Json(out))
}

/// POST /api/v1/portfolio/:id/unpublish
pub async fn handle_unpublish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<PortfolioOut>, AppError> {
    let out = service::unpublish(
        state.portfolios.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        id,
    )
    .await?;
    Ok(Json(out))
}

/// GET /api/v1/portfolio/public/:slug
///
/// Mounted outside the auth middleware.
pub async fn handle_public(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PublicPortfolio>, AppError> {
    Ok(Json(
        service::public(state.portfolios.as_ref(), state.storage.as_ref(), &slug).await?,
    ))
}
