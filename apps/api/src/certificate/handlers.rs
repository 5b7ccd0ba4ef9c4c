use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::service::{self, CertificateOut, CertificatePatch};
use crate::errors::AppError;
use crate::forms::FormFields;
use crate::identity::AuthUser;
use crate::state::AppState;
use crate::storage::DEFAULT_SIGNED_URL_TTL;

/// POST /api/v1/certificate/add
pub async fn handle_add(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut form = FormFields::read(multipart).await?;
    let uploads = service::parse_batch(&mut form, Utc::now().date_naive())?;
    let count = service::add(
        state.certificates.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        uploads,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Certifications added successfully", "count": count })),
    ))
}

/// GET /api/v1/certificate
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CertificateOut>>, AppError> {
    let certificates = service::list(
        state.certificates.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        DEFAULT_SIGNED_URL_TTL,
    )
    .await?;
    Ok(Json(certificates))
}

/// PATCH /api/v1/certificate/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<CertificateOut>, AppError> {
    let mut form = FormFields::read(multipart).await?;
    let patch = CertificatePatch {
        title: form.text("title").map(str::to_string),
        issuer: form.text("issuer").map(str::to_string),
        issued_date: form.text("issued_date").map(str::to_string),
        file: form.take_file("file"),
    };
    let updated = service::update(
        state.certificates.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        id,
        patch,
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/certificate/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    service::delete(
        state.certificates.as_ref(),
        state.storage.as_ref(),
        user.uid(),
        id,
    )
    .await?;
    Ok(Json(json!({ "message": "Certificate deleted successfully" })))
}
