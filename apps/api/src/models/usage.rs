use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Monthly AI usage counters for one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiUsageRow {
    pub user_id: String,
    pub request_count: i32,
    pub request_window_start: DateTime<Utc>,
    pub last_request_at: Option<DateTime<Utc>>,
    pub upload_count: i32,
    pub upload_window_start: DateTime<Utc>,
    pub last_upload_at: Option<DateTime<Utc>>,
}
