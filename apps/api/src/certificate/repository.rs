use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::certificate::CertificationRow;

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub title: String,
    pub issuer: String,
    pub issued_date: NaiveDate,
    pub link: String,
}

#[derive(Debug, Clone, Default)]
pub struct CertificateChanges {
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub link: Option<String>,
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Most recently issued first.
    async fn list(&self, uid: &str) -> Result<Vec<CertificationRow>, AppError>;
    async fn find(&self, uid: &str, id: i64) -> Result<Option<CertificationRow>, AppError>;
    async fn insert_many(
        &self,
        uid: &str,
        certificates: &[NewCertificate],
    ) -> Result<Vec<CertificationRow>, AppError>;
    async fn update(
        &self,
        uid: &str,
        id: i64,
        changes: &CertificateChanges,
    ) -> Result<Option<CertificationRow>, AppError>;
    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError>;
}

pub struct PgCertificateRepository {
    pool: PgPool,
}

impl PgCertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CertificateRepository for PgCertificateRepository {
    async fn list(&self, uid: &str) -> Result<Vec<CertificationRow>, AppError> {
        let rows = sqlx::query_as(
            "SELECT * FROM certifications WHERE user_id = $1 ORDER BY issued_date DESC, id DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<CertificationRow>, AppError> {
        let row = sqlx::query_as("SELECT * FROM certifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_many(
        &self,
        uid: &str,
        certificates: &[NewCertificate],
    ) -> Result<Vec<CertificationRow>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(certificates.len());
        for cert in certificates {
            let row: CertificationRow = sqlx::query_as(
                r#"
                INSERT INTO certifications (user_id, title, issuer, issued_date, link)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(uid)
            .bind(&cert.title)
            .bind(&cert.issuer)
            .bind(cert.issued_date)
            .bind(&cert.link)
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
        changes: &CertificateChanges,
    ) -> Result<Option<CertificationRow>, AppError> {
        let row = sqlx::query_as(
            r#"
            UPDATE certifications
            SET title       = COALESCE($3, title),
                issuer      = COALESCE($4, issuer),
                issued_date = COALESCE($5, issued_date),
                link        = COALESCE($6, link)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(uid)
        .bind(&changes.title)
        .bind(&changes.issuer)
        .bind(changes.issued_date)
        .bind(&changes.link)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM certifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
