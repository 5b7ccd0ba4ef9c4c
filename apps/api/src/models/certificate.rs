use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertificationRow {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub issuer: String,
    pub issued_date: NaiveDate,
    /// Storage path inside the certificates bucket, never a public URL.
    pub link: String,
    pub created_at: DateTime<Utc>,
}
