use chrono::NaiveDate;

use crate::errors::AppError;
use crate::forms::UploadedFile;

pub const MAX_CERTIFICATE_BYTES: usize = 5 * 1024 * 1024;

/// Only PDFs up to 5 MiB are accepted.
pub fn validate_file(file: &UploadedFile) -> Result<(), AppError> {
    if file.extension().as_deref() != Some(".pdf") {
        return Err(AppError::Validation("Only PDF files are supported.".into()));
    }
    if file.bytes.len() > MAX_CERTIFICATE_BYTES {
        return Err(AppError::PayloadTooLarge(
            "File size exceeds 5MB limit.".into(),
        ));
    }
    Ok(())
}

/// Parses an ISO date and checks it lies within `[1900-01-01, today]`.
pub fn validate_issued_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, AppError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation("Invalid issued_date format. Use YYYY-MM-DD.".into())
    })?;
    if date > today {
        return Err(AppError::Validation(
            "Certificate issue date cannot be in the future".into(),
        ));
    }
    let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
    if date < earliest {
        return Err(AppError::Validation(
            "Certificate issue date must be from 1900 onwards".into(),
        ));
    }
    Ok(date)
}
