//! Monthly per-user AI quotas.
//!
//! Requests (text optimization) and uploads (résumé analysis) are counted
//! separately. A counter resets as soon as the calendar month or year of its
//! window start differs from the current one.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::errors::AppError;
use crate::models::usage::AiUsageRow;

pub const REQUEST_LIMIT: i32 = 100;
pub const UPLOAD_LIMIT: i32 = 10;

pub const REQUEST_QUOTA_EXCEEDED: &str = "You have reached your monthly AI request quota.";
pub const UPLOAD_QUOTA_EXCEEDED: &str = "You have reached your monthly resume upload quota.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Request,
    Upload,
}

impl QuotaKind {
    pub fn limit(&self) -> i32 {
        match self {
            QuotaKind::Request => REQUEST_LIMIT,
            QuotaKind::Upload => UPLOAD_LIMIT,
        }
    }

    fn exceeded(&self) -> AppError {
        match self {
            QuotaKind::Request => AppError::RateLimited(REQUEST_QUOTA_EXCEEDED.into()),
            QuotaKind::Upload => AppError::RateLimited(UPLOAD_QUOTA_EXCEEDED.into()),
        }
    }

    /// (count, window start, last use) columns of `ai_usage`.
    fn columns(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            QuotaKind::Request => ("request_count", "request_window_start", "last_request_at"),
            QuotaKind::Upload => ("upload_count", "upload_window_start", "last_upload_at"),
        }
    }
}

/// Row for a user who has never used an AI feature.
pub fn fresh_usage(uid: &str, now: DateTime<Utc>) -> AiUsageRow {
    AiUsageRow {
        user_id: uid.to_string(),
        request_count: 0,
        request_window_start: now,
        last_request_at: None,
        upload_count: 0,
        upload_window_start: now,
        last_upload_at: None,
    }
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Counts one use of `kind` at `now`, or fails with `RateLimited` when the
/// current month's allowance is spent. The other counter is left untouched.
pub fn consume(
    row: &AiUsageRow,
    kind: QuotaKind,
    now: DateTime<Utc>,
) -> Result<AiUsageRow, AppError> {
    let mut next = row.clone();
    let (count, window_start, last_at) = match kind {
        QuotaKind::Request => (
            &mut next.request_count,
            &mut next.request_window_start,
            &mut next.last_request_at,
        ),
        QuotaKind::Upload => (
            &mut next.upload_count,
            &mut next.upload_window_start,
            &mut next.last_upload_at,
        ),
    };

    if !same_month(*window_start, now) {
        *count = 1;
        *window_start = now;
    } else if *count >= kind.limit() {
        return Err(kind.exceeded());
    } else {
        *count += 1;
    }
    *last_at = Some(now);
    Ok(next)
}

#[async_trait]
pub trait AiUsageRepository: Send + Sync {
    /// Atomically applies `consume` to the stored counters of `uid`.
    async fn consume(&self, uid: &str, kind: QuotaKind, now: DateTime<Utc>) -> Result<(), AppError>;
}

pub struct PgAiUsageRepository {
    pool: PgPool,
}

impl PgAiUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AiUsageRepository for PgAiUsageRepository {
    async fn consume(
        &self,
        uid: &str,
        kind: QuotaKind,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO ai_usage (user_id, request_window_start, upload_window_start)
            VALUES ($1, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(uid)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row: AiUsageRow = sqlx::query_as("SELECT * FROM ai_usage WHERE user_id = $1 FOR UPDATE")
            .bind(uid)
            .fetch_one(&mut *tx)
            .await?;

        let next = match consume(&row, kind, now) {
            Ok(next) => next,
            Err(e) => {
                warn!("AI {kind:?} quota exhausted for {uid}");
                return Err(e);
            }
        };

        let (count_col, window_col, last_col) = kind.columns();
        let (count, window_start, last_at) = match kind {
            QuotaKind::Request => (
                next.request_count,
                next.request_window_start,
                next.last_request_at,
            ),
            QuotaKind::Upload => (
                next.upload_count,
                next.upload_window_start,
                next.last_upload_at,
            ),
        };
        sqlx::query(&format!(
            "UPDATE ai_usage SET {count_col} = $2, {window_col} = $3, {last_col} = $4 WHERE user_id = $1"
        ))
        .bind(uid)
        .bind(count)
        .bind(window_start)
        .bind(last_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
