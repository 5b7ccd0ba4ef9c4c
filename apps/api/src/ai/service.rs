use chrono::{DateTime, Utc};
use tracing::info;

use super::analyzer::{self, ResumeAnalysis, ResumeFormat, MAX_RESUME_BYTES};
use super::quota::{AiUsageRepository, QuotaKind};
use crate::errors::AppError;
use crate::forms::UploadedFile;
use crate::llm_client::prompts::RESUME_OPTIMIZER_SYSTEM;
use crate::llm_client::ChatModel;

pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Rewrites a résumé snippet. The length ceiling is checked before any quota
/// is spent.
pub async fn optimize(
    usage: &dyn AiUsageRepository,
    model: &dyn ChatModel,
    uid: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::PayloadTooLarge(
            "Request length exceeded the limit of 1000 characters.".into(),
        ));
    }
    usage.consume(uid, QuotaKind::Request, now).await?;

    let optimized = model
        .complete(RESUME_OPTIMIZER_SYSTEM, description)
        .await
        .map_err(|e| AppError::Upstream(format!("Text optimization failed: {e}")))?;
    info!("Optimized {} chars of résumé text for {uid}", description.len());
    Ok(optimized)
}

pub async fn analyze(
    usage: &dyn AiUsageRepository,
    model: &dyn ChatModel,
    uid: &str,
    file: UploadedFile,
    now: DateTime<Utc>,
) -> Result<ResumeAnalysis, AppError> {
    if file.bytes.len() > MAX_RESUME_BYTES {
        return Err(AppError::PayloadTooLarge(
            "Uploaded file is too large. Maximum allowed size is 8MB.".into(),
        ));
    }
    let format = ResumeFormat::detect(&file)?;
    usage.consume(uid, QuotaKind::Upload, now).await?;

    let text = analyzer::extract_text(format, file.bytes).await;
    info!("Analyzing {format:?} résumé for {uid} ({} chars)", text.len());
    Ok(analyzer::analyze(model, &text).await)
}
