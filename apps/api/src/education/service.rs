use chrono::NaiveDate;
use serde::Deserialize;

use super::repository::{EducationInput, EducationRepository};
use crate::errors::AppError;
use crate::models::education::EducationRow;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EducationUpdate {
    pub degree: Option<String>,
    pub institution: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub gpa: Option<f64>,
    pub honors: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Education not found".into())
}

pub fn validate(entry: &EducationInput) -> Result<(), AppError> {
    if entry.degree.trim().is_empty() || entry.institution.trim().is_empty() {
        return Err(AppError::Validation(
            "Degree and institution are required".into(),
        ));
    }
    if entry.end_date < entry.start_date {
        return Err(AppError::Validation(
            "Education end date cannot be before its start date".into(),
        ));
    }
    if let Some(gpa) = entry.gpa {
        if !(0.0..=10.0).contains(&gpa) {
            return Err(AppError::Validation("GPA must be between 0 and 10".into()));
        }
    }
    Ok(())
}

pub async fn list(
    repo: &dyn EducationRepository,
    uid: &str,
) -> Result<Vec<EducationRow>, AppError> {
    repo.list(uid).await
}

pub async fn add(
    repo: &dyn EducationRepository,
    uid: &str,
    entries: Vec<EducationInput>,
) -> Result<Vec<EducationRow>, AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation("No education entries provided".into()));
    }
    entries.iter().try_for_each(validate)?;
    repo.insert_many(uid, &entries).await
}

pub async fn update(
    repo: &dyn EducationRepository,
    uid: &str,
    id: i64,
    update: EducationUpdate,
) -> Result<EducationRow, AppError> {
    let current = repo.find(uid, id).await?.ok_or_else(not_found)?;
    let mut merged = EducationInput::from(current);
    if let Some(degree) = update.degree {
        merged.degree = degree;
    }
    if let Some(institution) = update.institution {
        merged.institution = institution;
    }
    if let Some(location) = update.location {
        merged.location = location;
    }
    if let Some(start) = update.start_date {
        merged.start_date = start;
    }
    if let Some(end) = update.end_date {
        merged.end_date = end;
    }
    if update.gpa.is_some() {
        merged.gpa = update.gpa;
    }
    if update.honors.is_some() {
        merged.honors = update.honors;
    }
    validate(&merged)?;

    repo.update(uid, id, &merged).await?.ok_or_else(not_found)
}

pub async fn delete(repo: &dyn EducationRepository, uid: &str, id: i64) -> Result<(), AppError> {
    if repo.delete(uid, id).await? {
        Ok(())
    } else {
        Err(not_found())
    }
}
