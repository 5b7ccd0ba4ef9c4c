use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::catalog::DocumentContent;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRow {
    pub id: i64,
    pub user_id: String,
    pub cv_type: String,
    pub title: String,
    pub template: i32,
    pub is_draft: bool,
    pub bookmark: bool,
    pub pdf_url: Option<String>,
    pub latest_saved_version_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable snapshot, created per manual save.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvVersionRow {
    pub id: i64,
    pub cv_id: i64,
    pub version_number: i32,
    pub pdf_url: String,
    pub parent_version_id: Option<i64>,
    pub content: Json<DocumentContent>,
    pub created_at: DateTime<Utc>,
}

/// A CV joined with the number of its latest saved version (0 when never saved).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvSummaryRow {
    pub id: i64,
    pub cv_type: String,
    pub title: String,
    pub template: i32,
    pub is_draft: bool,
    pub bookmark: bool,
    pub latest_saved_version_id: Option<i64>,
    pub version_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
