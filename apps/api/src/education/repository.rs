use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::education::EducationRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationInput {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub honors: Option<String>,
}

impl From<EducationRow> for EducationInput {
    fn from(row: EducationRow) -> Self {
        Self {
            degree: row.degree,
            institution: row.institution,
            location: row.location,
            start_date: row.start_date,
            end_date: row.end_date,
            gpa: row.gpa,
            honors: row.honors,
        }
    }
}

#[async_trait]
pub trait EducationRepository: Send + Sync {
    /// Newest first (by end date).
    async fn list(&self, uid: &str) -> Result<Vec<EducationRow>, AppError>;
    async fn find(&self, uid: &str, id: i64) -> Result<Option<EducationRow>, AppError>;
    /// Inserts all entries or none.
    async fn insert_many(
        &self,
        uid: &str,
        entries: &[EducationInput],
    ) -> Result<Vec<EducationRow>, AppError>;
    async fn update(
        &self,
        uid: &str,
        id: i64,
        entry: &EducationInput,
    ) -> Result<Option<EducationRow>, AppError>;
    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError>;
}

pub struct PgEducationRepository {
    pool: PgPool,
}

impl PgEducationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EducationRepository for PgEducationRepository {
    async fn list(&self, uid: &str) -> Result<Vec<EducationRow>, AppError> {
        let rows = sqlx::query_as(
            "SELECT * FROM educations WHERE user_id = $1 ORDER BY end_date DESC, id DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<EducationRow>, AppError> {
        let row = sqlx::query_as("SELECT * FROM educations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_many(
        &self,
        uid: &str,
        entries: &[EducationInput],
    ) -> Result<Vec<EducationRow>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(entries.len());
        for entry in entries {
            let row: EducationRow = sqlx::query_as(
                r#"
                INSERT INTO educations
                    (user_id, degree, institution, location, start_date, end_date, gpa, honors)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(uid)
            .bind(&entry.degree)
            .bind(&entry.institution)
            .bind(&entry.location)
            .bind(entry.start_date)
            .bind(entry.end_date)
            .bind(entry.gpa)
            .bind(&entry.honors)
            .fetch_one(&mut *tx)
            .await?;
            created.push(row);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update(
        &self,
        uid: &str,
        id: i64,
        entry: &EducationInput,
    ) -> Result<Option<EducationRow>, AppError> {
        let row = sqlx::query_as(
            r#"
            UPDATE educations
            SET degree = $3, institution = $4, location = $5, start_date = $6,
                end_date = $7, gpa = $8, honors = $9
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(uid)
        .bind(&entry.degree)
        .bind(&entry.institution)
        .bind(&entry.location)
        .bind(entry.start_date)
        .bind(entry.end_date)
        .bind(entry.gpa)
        .bind(&entry.honors)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM educations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
