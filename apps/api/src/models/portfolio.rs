use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioRow {
    pub id: i64,
    pub user_id: String,
    pub theme: String,
    pub title: String,
    pub bio: Option<String>,
    pub image_path: Option<String>,
    pub is_public: bool,
    pub published_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
