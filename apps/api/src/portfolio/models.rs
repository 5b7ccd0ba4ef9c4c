use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::DocumentContent;
use crate::errors::AppError;
use crate::models::portfolio::PortfolioRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Modern,
    Classic,
}

impl Theme {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "modern" => Ok(Theme::Modern),
            "classic" => Ok(Theme::Classic),
            _ => Err(AppError::Validation(
                "Invalid portfolio theme. Use 'modern' or 'classic'".into(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Modern => "modern",
            Theme::Classic => "classic",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePortfolioRequest {
    pub theme: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePortfolioResponse {
    pub portfolio_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioAutosaveRequest {
    pub portfolio_id: i64,
    #[serde(alias = "draft_data")]
    pub draft_content: DocumentContent,
}

/// Entry of `GET /portfolio/list`.
#[derive(Debug, Serialize)]
pub struct PortfolioListItem {
    pub portfolio_id: i64,
    pub title: String,
    pub theme: String,
    pub bio: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PortfolioRow> for PortfolioListItem {
    fn from(row: PortfolioRow) -> Self {
        Self {
            portfolio_id: row.id,
            title: row.title,
            theme: row.theme,
            bio: row.bio.unwrap_or_default(),
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Owner view of a portfolio. `image_url` is a signed link, never the raw path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioOut {
    pub portfolio_id: i64,
    pub title: String,
    pub theme: String,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub published_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioOut {
    pub fn new(row: PortfolioRow, image_url: Option<String>) -> Self {
        Self {
            portfolio_id: row.id,
            title: row.title,
            theme: row.theme,
            bio: row.bio,
            image_url,
            is_public: row.is_public,
            published_url: row.published_url,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioDetail {
    #[serde(flatten)]
    pub portfolio: PortfolioOut,
    pub has_unsaved_changes: bool,
    #[serde(flatten)]
    pub content: DocumentContent,
}

/// What anonymous visitors of a published portfolio see.
#[derive(Debug, Serialize)]
pub struct PublicPortfolio {
    pub title: String,
    pub theme: String,
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub content: DocumentContent,
}
