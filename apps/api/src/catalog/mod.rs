//! Catalog items shared between CVs and portfolios.
//!
//! Experiences, projects, publications and technical skills belong to a user
//! and can be linked from any number of that user's CVs and portfolios. Items
//! arriving without an `id` are created; items with an `id` are linked (and
//! refreshed in place) rather than duplicated.

pub mod repository;

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Project,
    Publication,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Project => "project",
            SourceType::Publication => "publication",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub job_title: String,
    #[serde(default)]
    pub position: String,
    pub company: String,
    #[serde(default)]
    pub company_url: Option<String>,
    #[serde(default)]
    pub company_logo: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub employment_type: String,
    #[serde(default)]
    pub location_type: String,
    #[serde(default)]
    pub industry: String,
    pub start_date: NaiveDate,
    /// `None` for a current role.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSkillItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTechnologyItem {
    pub technology: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUrlItem {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<ProjectTechnologyItem>,
    #[serde(default)]
    pub urls: Vec<ResourceUrlItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub journal: String,
    pub year: i32,
    #[serde(default)]
    pub urls: Vec<ResourceUrlItem>,
}

/// The linked content of one CV or portfolio, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default)]
    pub experiences: Vec<ExperienceItem>,
    #[serde(default)]
    pub publications: Vec<PublicationItem>,
    #[serde(default)]
    pub technical_skills: Vec<TechnicalSkillItem>,
    #[serde(default)]
    pub projects: Vec<ProjectItem>,
}

impl DocumentContent {
    pub fn validate(&self) -> Result<(), AppError> {
        for exp in &self.experiences {
            if exp.job_title.trim().is_empty() || exp.company.trim().is_empty() {
                return Err(AppError::Validation(
                    "Experience requires a job title and a company".into(),
                ));
            }
            if let Some(end) = exp.end_date {
                if end < exp.start_date {
                    return Err(AppError::Validation(format!(
                        "Experience at '{}' ends before it starts",
                        exp.company
                    )));
                }
            }
        }
        if self.projects.iter().any(|p| p.name.trim().is_empty()) {
            return Err(AppError::Validation("Project name cannot be empty".into()));
        }
        if self.publications.iter().any(|p| p.title.trim().is_empty()) {
            return Err(AppError::Validation(
                "Publication title cannot be empty".into(),
            ));
        }
        if self.technical_skills.iter().any(|s| s.name.trim().is_empty()) {
            return Err(AppError::Validation(
                "Technical skill name cannot be empty".into(),
            ));
        }
        Ok(())
    }

    /// Copy with every catalog id removed, for public exposure.
    pub fn without_ids(&self) -> DocumentContent {
        let mut content = self.clone();
        content.experiences.iter_mut().for_each(|e| e.id = None);
        content.publications.iter_mut().for_each(|p| p.id = None);
        content.technical_skills.iter_mut().for_each(|s| s.id = None);
        content.projects.iter_mut().for_each(|p| p.id = None);
        content
    }

    /// Drops later repeats of an already-listed item id; items without an id are kept.
    pub fn without_repeated_ids(&self) -> DocumentContent {
        fn first_only<T>(items: &[T], id: impl Fn(&T) -> Option<i64>) -> Vec<T>
        where
            T: Clone,
        {
            let mut seen = HashSet::new();
            items
                .iter()
                .filter(|item| id(item).map_or(true, |id| seen.insert(id)))
                .cloned()
                .collect()
        }
        DocumentContent {
            experiences: first_only(&self.experiences, |e| e.id),
            publications: first_only(&self.publications, |p| p.id),
            technical_skills: first_only(&self.technical_skills, |s| s.id),
            projects: first_only(&self.projects, |p| p.id),
        }
    }

    /// Experiences ordered for display: current roles first, then by end date descending.
    pub fn experiences_by_recency(&self) -> Vec<ExperienceItem> {
        let mut experiences = self.experiences.clone();
        experiences.sort_by(|a, b| match (a.end_date, b.end_date) {
            (None, None) => b.start_date.cmp(&a.start_date),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        });
        experiences
    }
}
