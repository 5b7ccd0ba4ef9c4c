use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::analyzer::ResumeAnalysis;
use super::service;
use crate::errors::AppError;
use crate::forms::FormFields;
use crate::identity::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub optimized_text: String,
}

/// POST /api/v1/ai/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    let optimized_text = service::optimize(
        state.usage.as_ref(),
        state.optimizer.as_ref(),
        user.uid(),
        &req.description,
        Utc::now(),
    )
    .await?;
    Ok(Json(OptimizeResponse { optimized_text }))
}

/// POST /api/v1/ai/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<ResumeAnalysis>, AppError> {
    let mut form = FormFields::read(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::Validation("A resume file is required".into()))?;
    let analysis = service::analyze(
        state.usage.as_ref(),
        state.analyzer.as_ref(),
        user.uid(),
        file,
        Utc::now(),
    )
    .await?;
    Ok(Json(analysis))
}
