use async_trait::async_trait;
use sqlx::PgPool;

use crate::catalog::repository::{load_content, replace_content, PORTFOLIO_LINKS};
use crate::catalog::DocumentContent;
use crate::errors::AppError;
use crate::models::portfolio::PortfolioRow;

pub const SLUG_TAKEN: &str = "Public portfolio URL is already taken";

pub fn portfolio_not_found() -> AppError {
    AppError::NotFound("Portfolio not found".into())
}

/// Column values for `update`; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PortfolioChanges {
    pub title: Option<String>,
    pub bio: Option<String>,
    pub theme: Option<String>,
    pub image_path: Option<String>,
}

#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    async fn create(&self, uid: &str, theme: &str, title: &str) -> Result<PortfolioRow, AppError>;
    /// Most recently updated first.
    async fn list(&self, uid: &str) -> Result<Vec<PortfolioRow>, AppError>;
    async fn find(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError>;
    async fn content(&self, id: i64) -> Result<DocumentContent, AppError>;
    /// Applies column changes and, when given, rewrites the linked content.
    /// Both happen in one transaction.
    async fn update(
        &self,
        uid: &str,
        id: i64,
        changes: PortfolioChanges,
        content: Option<&DocumentContent>,
    ) -> Result<Option<PortfolioRow>, AppError>;
    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError>;
    /// Fails with `Conflict(SLUG_TAKEN)` when another portfolio holds `slug`.
    async fn publish(
        &self,
        uid: &str,
        id: i64,
        slug: &str,
    ) -> Result<Option<PortfolioRow>, AppError>;
    async fn unpublish(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError>;
    async fn find_public(&self, slug: &str) -> Result<Option<PortfolioRow>, AppError>;
}

pub struct PgPortfolioRepository {
    pool: PgPool,
}

impl PgPortfolioRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortfolioRepository for PgPortfolioRepository {
    async fn create(&self, uid: &str, theme: &str, title: &str) -> Result<PortfolioRow, AppError> {
        let row = sqlx::query_as(
            "INSERT INTO portfolios (user_id, theme, title) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(uid)
        .bind(theme)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, uid: &str) -> Result<Vec<PortfolioRow>, AppError> {
        let rows = sqlx::query_as(
            "SELECT * FROM portfolios WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError> {
        let row = sqlx::query_as("SELECT * FROM portfolios WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn content(&self, id: i64) -> Result<DocumentContent, AppError> {
        load_content(&self.pool, &PORTFOLIO_LINKS, id).await
    }

    async fn update(
        &self,
        uid: &str,
        id: i64,
        changes: PortfolioChanges,
        content: Option<&DocumentContent>,
    ) -> Result<Option<PortfolioRow>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<PortfolioRow> = sqlx::query_as(
            r#"
            UPDATE portfolios
            SET title = COALESCE($3, title),
                bio = COALESCE($4, bio),
                theme = COALESCE($5, theme),
                image_path = COALESCE($6, image_path),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(uid)
        .bind(changes.title)
        .bind(changes.bio)
        .bind(changes.theme)
        .bind(changes.image_path)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if let Some(content) = content {
            replace_content(&mut tx, &PORTFOLIO_LINKS, uid, id, content).await?;
        }

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn publish(
        &self,
        uid: &str,
        id: i64,
        slug: &str,
    ) -> Result<Option<PortfolioRow>, AppError> {
        sqlx::query_as(
            r#"
            UPDATE portfolios
            SET published_url = $3, is_public = TRUE, published_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(uid)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, SLUG_TAKEN))
    }

    async fn unpublish(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError> {
        let row = sqlx::query_as(
            r#"
            UPDATE portfolios
            SET published_url = NULL, is_public = FALSE, published_at = NULL, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_public(&self, slug: &str) -> Result<Option<PortfolioRow>, AppError> {
        let row = sqlx::query_as(
            "SELECT * FROM portfolios WHERE published_url = $1 AND is_public = TRUE",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
