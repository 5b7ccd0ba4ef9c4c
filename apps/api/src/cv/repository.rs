use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::catalog::repository::{load_content, replace_content, CV_LINKS};
use crate::catalog::DocumentContent;
use crate::errors::AppError;
use crate::models::cv::{CvRow, CvSummaryRow, CvVersionRow};

pub fn cv_not_found() -> AppError {
    AppError::NotFound("CV not found".into())
}

#[async_trait]
pub trait CvRepository: Send + Sync {
    async fn create(
        &self,
        uid: &str,
        cv_type: &str,
        title: &str,
        template: i32,
    ) -> Result<CvRow, AppError>;
    async fn list(&self, uid: &str) -> Result<Vec<CvSummaryRow>, AppError>;
    async fn find(&self, uid: &str, cv_id: i64) -> Result<Option<CvRow>, AppError>;
    /// Number of the version `latest_saved_version_id` points at.
    async fn latest_version_number(&self, cv: &CvRow) -> Result<Option<i32>, AppError>;
    async fn content(&self, cv_id: i64) -> Result<DocumentContent, AppError>;
    async fn update_meta(
        &self,
        uid: &str,
        cv_id: i64,
        title: Option<String>,
        bookmark: Option<bool>,
    ) -> Result<Option<CvRow>, AppError>;
    async fn set_pdf_url(&self, cv_id: i64, path: &str) -> Result<(), AppError>;
    async fn delete(&self, uid: &str, cv_id: i64) -> Result<bool, AppError>;
    /// Persists `content` as the next version of the CV, atomically.
    ///
    /// Fails with `NotFound` when the CV is not owned by `uid` or when the
    /// content references catalog items `uid` does not own.
    async fn save_version(
        &self,
        uid: &str,
        cv_id: i64,
        pdf_url: Option<&str>,
        content: &DocumentContent,
    ) -> Result<(CvRow, CvVersionRow), AppError>;
    /// Ascending by version number.
    async fn versions(&self, cv_id: i64) -> Result<Vec<CvVersionRow>, AppError>;
    async fn version(&self, cv_id: i64, number: i32) -> Result<Option<CvVersionRow>, AppError>;
}

pub struct PgCvRepository {
    pool: PgPool,
}

impl PgCvRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CvRepository for PgCvRepository {
    async fn create(
        &self,
        uid: &str,
        cv_type: &str,
        title: &str,
        template: i32,
    ) -> Result<CvRow, AppError> {
        let cv = sqlx::query_as(
            r#"
            INSERT INTO cvs (user_id, cv_type, title, template, is_draft, bookmark)
            VALUES ($1, $2, $3, $4, TRUE, FALSE)
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(cv_type)
        .bind(title)
        .bind(template)
        .fetch_one(&self.pool)
        .await?;
        Ok(cv)
    }

    async fn list(&self, uid: &str) -> Result<Vec<CvSummaryRow>, AppError> {
        let rows = sqlx::query_as(
            r#"
            SELECT c.id, c.cv_type, c.title, c.template, c.is_draft, c.bookmark,
                   c.latest_saved_version_id,
                   COALESCE(v.version_number, 0) AS version_number,
                   c.created_at, c.updated_at
            FROM cvs c
            LEFT JOIN cv_versions v ON v.id = c.latest_saved_version_id
            WHERE c.user_id = $1
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, uid: &str, cv_id: i64) -> Result<Option<CvRow>, AppError> {
        let cv = sqlx::query_as("SELECT * FROM cvs WHERE id = $1 AND user_id = $2")
            .bind(cv_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cv)
    }

    async fn latest_version_number(&self, cv: &CvRow) -> Result<Option<i32>, AppError> {
        let Some(version_id) = cv.latest_saved_version_id else {
            return Ok(None);
        };
        let number = sqlx::query_scalar("SELECT version_number FROM cv_versions WHERE id = $1")
            .bind(version_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(number)
    }

    async fn content(&self, cv_id: i64) -> Result<DocumentContent, AppError> {
        load_content(&self.pool, &CV_LINKS, cv_id).await
    }

    async fn update_meta(
        &self,
        uid: &str,
        cv_id: i64,
        title: Option<String>,
        bookmark: Option<bool>,
    ) -> Result<Option<CvRow>, AppError> {
        let cv = sqlx::query_as(
            r#"
            UPDATE cvs
            SET title = COALESCE($3, title),
                bookmark = COALESCE($4, bookmark),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(cv_id)
        .bind(uid)
        .bind(title)
        .bind(bookmark)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cv)
    }

    async fn set_pdf_url(&self, cv_id: i64, path: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE cvs SET pdf_url = $2, updated_at = NOW() WHERE id = $1")
            .bind(cv_id)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, uid: &str, cv_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        // Versions reference the CV and the CV references a version; break the cycle first.
        let owned = sqlx::query(
            "UPDATE cvs SET latest_saved_version_id = NULL WHERE id = $1 AND user_id = $2",
        )
        .bind(cv_id)
        .bind(uid)
        .execute(&mut *tx)
        .await?;
        if owned.rows_affected() == 0 {
            return Ok(false);
        }
        sqlx::query("DELETE FROM cvs WHERE id = $1 AND user_id = $2")
            .bind(cv_id)
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn save_version(
        &self,
        uid: &str,
        cv_id: i64,
        pdf_url: Option<&str>,
        content: &DocumentContent,
    ) -> Result<(CvRow, CvVersionRow), AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent saves of the same CV.
        let cv: CvRow =
            sqlx::query_as("SELECT * FROM cvs WHERE id = $1 AND user_id = $2 FOR UPDATE")
                .bind(cv_id)
                .bind(uid)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(cv_not_found)?;

        let previous: Option<(i64, i32)> = sqlx::query_as(
            "SELECT id, version_number FROM cv_versions WHERE cv_id = $1 ORDER BY version_number DESC LIMIT 1",
        )
        .bind(cv_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (parent_version_id, next_number) = match previous {
            Some((id, number)) => (Some(id), number + 1),
            None => (None, 1),
        };

        let saved = replace_content(&mut tx, &CV_LINKS, uid, cv_id, content).await?;

        let snapshot_pdf = pdf_url
            .map(str::to_string)
            .or_else(|| cv.pdf_url.clone())
            .unwrap_or_default();
        let version: CvVersionRow = sqlx::query_as(
            r#"
            INSERT INTO cv_versions (cv_id, version_number, pdf_url, parent_version_id, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(cv_id)
        .bind(next_number)
        .bind(&snapshot_pdf)
        .bind(parent_version_id)
        .bind(Json(&saved))
        .fetch_one(&mut *tx)
        .await?;

        let cv: CvRow = sqlx::query_as(
            r#"
            UPDATE cvs
            SET latest_saved_version_id = $2, is_draft = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(cv_id)
        .bind(version.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Saved CV {cv_id} as version {next_number}");
        Ok((cv, version))
    }

    async fn versions(&self, cv_id: i64) -> Result<Vec<CvVersionRow>, AppError> {
        let rows = sqlx::query_as(
            "SELECT * FROM cv_versions WHERE cv_id = $1 ORDER BY version_number ASC",
        )
        .bind(cv_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn version(&self, cv_id: i64, number: i32) -> Result<Option<CvVersionRow>, AppError> {
        let row = sqlx::query_as(
            "SELECT * FROM cv_versions WHERE cv_id = $1 AND version_number = $2",
        )
        .bind(cv_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
