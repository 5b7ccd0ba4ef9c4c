//! TTL key-value cache holding unsaved CV and portfolio drafts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::DocumentContent;
use crate::errors::AppError;

pub const DRAFT_TTL: Duration = Duration::from_secs(3600);

pub fn cv_draft_key(cv_id: i64) -> String {
    format!("autosave:cv:{cv_id}")
}

pub fn portfolio_draft_key(portfolio_id: i64) -> String {
    format!("autosave:portfolio:{portfolio_id}")
}

#[async_trait]
pub trait DraftCache: Send + Sync {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError>;
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// What is stored under a draft key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEnvelope {
    pub user_id: String,
    pub draft_content: DocumentContent,
    pub timestamp: DateTime<Utc>,
}

pub async fn store_draft(
    cache: &dyn DraftCache,
    key: &str,
    uid: &str,
    content: &DocumentContent,
) -> Result<DraftEnvelope, AppError> {
    let envelope = DraftEnvelope {
        user_id: uid.to_string(),
        draft_content: content.clone(),
        timestamp: Utc::now(),
    };
    let raw = serde_json::to_string(&envelope).map_err(|e| AppError::Cache(e.to_string()))?;
    cache.put(key, raw, DRAFT_TTL).await?;
    Ok(envelope)
}

/// Reads a draft back. Entries that no longer parse, or that were written by
/// another user, are treated as absent.
pub async fn load_draft(
    cache: &dyn DraftCache,
    key: &str,
    uid: &str,
) -> Result<Option<DraftEnvelope>, AppError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str::<DraftEnvelope>(&raw) {
        Ok(envelope) if envelope.user_id == uid => Ok(Some(envelope)),
        Ok(_) => Ok(None),
        Err(e) => {
            warn!("Discarding unreadable draft under {key}: {e}");
            Ok(None)
        }
    }
}

#[derive(Clone)]
pub struct RedisDraftCache {
    conn: ConnectionManager,
}

impl RedisDraftCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DraftCache for RedisDraftCache {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to store {key}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to delete {key}: {e}")))?;
        Ok(())
    }
}
