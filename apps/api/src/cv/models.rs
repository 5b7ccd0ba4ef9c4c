use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::DocumentContent;
use crate::errors::AppError;
use crate::models::cv::{CvRow, CvSummaryRow, CvVersionRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvType {
    Academic,
    Industry,
}

impl CvType {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "academic" => Ok(CvType::Academic),
            "industry" => Ok(CvType::Industry),
            _ => Err(AppError::Validation(
                "Invalid CV type. Use 'academic' or 'industry'".into(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CvType::Academic => "academic",
            CvType::Industry => "industry",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCvRequest {
    #[serde(rename = "type")]
    pub cv_type: String,
    #[serde(default = "default_template")]
    pub template: i32,
}

fn default_template() -> i32 {
    1
}

#[derive(Debug, Serialize)]
pub struct CreateCvResponse {
    pub cv_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCvRequest {
    pub title: Option<String>,
    pub bookmark: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AutosaveRequest {
    pub cv_id: i64,
    #[serde(alias = "draft_data")]
    pub draft_content: DocumentContent,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub cv_id: i64,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub content: DocumentContent,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub cv_id: i64,
    pub draft_content: DocumentContent,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub cv_id: i64,
    pub draft_content: DocumentContent,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AutosaveResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvOut {
    pub id: i64,
    #[serde(rename = "type")]
    pub cv_type: String,
    pub title: String,
    pub template: i32,
    pub is_draft: bool,
    pub bookmark: bool,
    pub pdf_url: Option<String>,
    pub latest_saved_version_id: Option<i64>,
    pub version_number: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CvOut {
    pub fn new(cv: CvRow, version_number: Option<i32>) -> Self {
        Self {
            id: cv.id,
            cv_type: cv.cv_type,
            title: cv.title,
            template: cv.template,
            is_draft: cv.is_draft,
            bookmark: cv.bookmark,
            pdf_url: cv.pdf_url,
            latest_saved_version_id: cv.latest_saved_version_id,
            version_number,
            created_at: cv.created_at,
            updated_at: cv.updated_at,
        }
    }
}

/// A CV with its content, taken from the pending draft when one exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvDetail {
    #[serde(flatten)]
    pub cv: CvOut,
    pub has_unsaved_changes: bool,
    #[serde(flatten)]
    pub content: DocumentContent,
}

#[derive(Debug, Serialize)]
pub struct CvListItem {
    pub cv_id: i64,
    #[serde(rename = "type")]
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

impl From<CvSummaryRow> for CvListItem {
    fn from(row: CvSummaryRow) -> Self {
        Self {
            cv_id: row.id,
            cv_type: row.cv_type,
            title: row.title,
            template: row.template,
            is_draft: row.is_draft,
            bookmark: row.bookmark,
            latest_saved_version_id: row.latest_saved_version_id,
            version_number: row.version_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionOut {
    pub id: i64,
    pub version_number: i32,
    pub pdf_url: String,
    pub parent_version_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub content: DocumentContent,
}

impl From<CvVersionRow> for VersionOut {
    fn from(row: CvVersionRow) -> Self {
        Self {
            id: row.id,
            version_number: row.version_number,
            pdf_url: row.pdf_url,
            parent_version_id: row.parent_version_id,
            created_at: row.created_at,
            content: row.content.0,
        }
    }
}
