use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::identity::AuthUser;

#[derive(Debug, Serialize)]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub job_id: String,
    #[serde(default)]
    pub cv_id: Option<i64>,
}

/// GET /api/v1/jobs/search
pub async fn handle_search(_user: AuthUser) -> Json<Vec<JobListing>> {
    Json(Vec::new())
}

/// GET /api/v1/jobs/suggested
pub async fn handle_suggested(_user: AuthUser) -> Json<Vec<JobListing>> {
    Json(Vec::new())
}

/// GET /api/v1/jobs/history
pub async fn handle_history(_user: AuthUser) -> Json<Vec<JobListing>> {
    Json(Vec::new())
}

/// GET /api/v1/jobs/:id/similar
pub async fn handle_similar(_user: AuthUser, Path(_id): Path<String>) -> Json<Vec<JobListing>> {
    Json(Vec::new())
}

/// POST /api/v1/jobs/apply
pub async fn handle_apply(user: AuthUser, Json(req): Json<ApplyRequest>) -> Json<Value> {
    info!(
        "Application intent from {} for job {} (cv {:?})",
        user.uid(),
        req.job_id,
        req.cv_id
    );
    Json(json!({
        "message": "Application received",
        "job_id": req.job_id,
    }))
}
