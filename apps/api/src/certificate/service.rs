use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::repository::{CertificateChanges, CertificateRepository, NewCertificate};
use super::validation::{validate_file, validate_issued_date};
use crate::errors::AppError;
use crate::forms::{FormFields, UploadedFile};
use crate::models::certificate::CertificationRow;
use crate::storage::{object_path, Bucket, ObjectStorage};

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Serialize)]
pub struct CertificateOut {
    pub id: i64,
    pub title: String,
    pub issuer: String,
    pub issued_date: NaiveDate,
    /// Time-limited signed URL, never the storage path.
    pub link: String,
}

/// One validated entry of a batch upload.
#[derive(Debug, Clone)]
pub struct CertificateUpload {
    pub title: String,
    pub issuer: String,
    pub issued_date: NaiveDate,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Default)]
pub struct CertificatePatch {
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub issued_date: Option<String>,
    pub file: Option<UploadedFile>,
}

fn not_found() -> AppError {
    AppError::NotFound("Certificate not found".into())
}

/// Reads `title_N`, `issuer_N`, `issued_date_N` and `file_N` for N = 0, 1, ...
/// up to the first index with none of them, validating every entry.
pub fn parse_batch(
    form: &mut FormFields,
    today: NaiveDate,
) -> Result<Vec<CertificateUpload>, AppError> {
    let mut uploads = Vec::new();
    for index in 0.. {
        let title = form.text(&format!("title_{index}")).map(str::to_string);
        let issuer = form.text(&format!("issuer_{index}")).map(str::to_string);
        let issued_date = form.text(&format!("issued_date_{index}")).map(str::to_string);
        let file_key = format!("file_{index}");

        if title.is_none() && issuer.is_none() && issued_date.is_none() && !form.has_file(&file_key)
        {
            break;
        }
        let (Some(title), Some(issuer), Some(issued_date)) = (title, issuer, issued_date) else {
            return Err(AppError::Validation("Missing certification metadata".into()));
        };
        let file = form
            .take_file(&file_key)
            .ok_or_else(|| AppError::Validation("Missing certification file".into()))?;

        validate_file(&file)?;
        let issued_date = validate_issued_date(&issued_date, today)?;
        uploads.push(CertificateUpload {
            title,
            issuer,
            issued_date,
            file,
        });
    }

    if uploads.is_empty() {
        return Err(AppError::Validation("Missing certification metadata".into()));
    }
    Ok(uploads)
}

async fn to_out(
    storage: &dyn ObjectStorage,
    row: CertificationRow,
    ttl: Duration,
) -> Result<CertificateOut, AppError> {
    let link = storage.signed_url(Bucket::Certificates, &row.link, ttl).await?;
    Ok(CertificateOut {
        id: row.id,
        title: row.title,
        issuer: row.issuer,
        issued_date: row.issued_date,
        link,
    })
}

pub async fn add(
    repo: &dyn CertificateRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    uploads: Vec<CertificateUpload>,
) -> Result<usize, AppError> {
    let mut rows: Vec<NewCertificate> = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let path = object_path(uid, ".pdf");
        if let Err(e) = storage
            .upload(Bucket::Certificates, &path, upload.file.bytes, PDF_CONTENT_TYPE)
            .await
        {
            discard_uploads(storage, rows.iter().map(|row| row.link.as_str())).await;
            return Err(e);
        }
        rows.push(NewCertificate {
            title: upload.title,
            issuer: upload.issuer,
            issued_date: upload.issued_date,
            link: path,
        });
    }

    match repo.insert_many(uid, &rows).await {
        Ok(created) => {
            info!("Stored {} certificate(s) for {uid}", created.len());
            Ok(created.len())
        }
        Err(e) => {
            discard_uploads(storage, rows.iter().map(|row| row.link.as_str())).await;
            Err(e)
        }
    }
}

/// Best-effort removal of objects whose rows were never written.
async fn discard_uploads<'a>(storage: &dyn ObjectStorage, paths: impl Iterator<Item = &'a str>) {
    for path in paths {
        if let Err(e) = storage.remove(Bucket::Certificates, path).await {
            warn!("Could not remove orphaned certificate {path}: {e}");
        }
    }
}

/// All certificates of `uid` with links signed for `ttl`.
pub async fn list(
    repo: &dyn CertificateRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    ttl: Duration,
) -> Result<Vec<CertificateOut>, AppError> {
    let mut out = Vec::new();
    for row in repo.list(uid).await? {
        out.push(to_out(storage, row, ttl).await?);
    }
    Ok(out)
}

pub async fn update(
    repo: &dyn CertificateRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
    patch: CertificatePatch,
    today: NaiveDate,
) -> Result<CertificateOut, AppError> {
    if patch.title.is_none()
        && patch.issuer.is_none()
        && patch.issued_date.is_none()
        && patch.file.is_none()
    {
        return Err(AppError::Validation("No fields provided to update".into()));
    }
    let issued_date = patch
        .issued_date
        .as_deref()
        .map(|raw| validate_issued_date(raw, today))
        .transpose()?;
    if let Some(file) = &patch.file {
        validate_file(file)?;
    }

    let current = repo.find(uid, id).await?.ok_or_else(not_found)?;

    let link = match patch.file {
        Some(file) => {
            let path = object_path(uid, ".pdf");
            storage
                .upload(Bucket::Certificates, &path, file.bytes, PDF_CONTENT_TYPE)
                .await?;
            Some(path)
        }
        None => None,
    };

    let changes = CertificateChanges {
        title: patch.title,
        issuer: patch.issuer,
        issued_date,
        link: link.clone(),
    };
    let row = match repo.update(uid, id, &changes).await {
        Ok(Some(row)) => row,
        outcome => {
            discard_uploads(storage, link.as_deref().into_iter()).await;
            return Err(outcome.err().unwrap_or_else(not_found));
        }
    };

    // The row now points at the new object; the old one is unreferenced.
    if link.is_some() {
        if let Err(e) = storage.remove(Bucket::Certificates, &current.link).await {
            warn!("Certificate {id} replaced but {} could not be removed: {e}", current.link);
        }
    }
    to_out(storage, row, crate::storage::DEFAULT_SIGNED_URL_TTL).await
}

pub async fn delete(
    repo: &dyn CertificateRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
) -> Result<(), AppError> {
    let current = repo.find(uid, id).await?.ok_or_else(not_found)?;
    storage.remove(Bucket::Certificates, &current.link).await?;
    if !repo.delete(uid, id).await? {
        return Err(not_found());
    }
    Ok(())
}
