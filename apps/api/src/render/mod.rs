//! Résumé rendering: structured content to LaTeX or HTML via Tera templates,
//! and LaTeX to PDF through a remote compiler.

pub mod compiler;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera, Value};

use crate::catalog::{DocumentContent, ExperienceItem, ResourceUrlItem};
use crate::errors::AppError;
use crate::models::certificate::CertificationRow;
use crate::models::education::EducationRow;
use crate::models::user::UserRow;

pub use compiler::{LatexCompiler, RemoteLatexCompiler};

/// Template ids run from 1 to this value.
pub const NUMBER_OF_CV_TEMPLATES: i32 = 1;

const TEMPLATES: &[(i32, &str, &str, &str)] = &[(
    1,
    include_str!("../../templates/resume/1/template.tex"),
    include_str!("../../templates/resume/1/template.html"),
    include_str!("../../templates/resume/1/resume.cls"),
)];

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub full_name: String,
    pub contact_line: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EducationView {
    pub degree: String,
    pub institution: String,
    pub location: String,
    pub period: String,
    pub gpa: Option<String>,
    pub honors: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperienceView {
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub period: String,
    pub description_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub urls: Vec<ResourceUrlItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicationView {
    pub title: String,
    pub journal: String,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<String>,
}

/// A certificate with its storage path already exchanged for a signed URL.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateView {
    pub title: String,
    pub issuer: String,
    pub issued_date: String,
    pub link: String,
}

impl CertificateView {
    pub fn new(row: &CertificationRow, link: String) -> Self {
        Self {
            title: row.title.clone(),
            issuer: row.issuer.clone(),
            issued_date: row.issued_date.to_string(),
            link,
        }
    }
}

/// Everything a résumé template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeDocument {
    pub profile: ProfileView,
    pub educations: Vec<EducationView>,
    pub experiences: Vec<ExperienceView>,
    pub projects: Vec<ProjectView>,
    pub skill_groups: Vec<SkillGroup>,
    pub publications: Vec<PublicationView>,
    pub certificates: Vec<CertificateView>,
}

impl ResumeDocument {
    pub fn new(
        user: &UserRow,
        educations: &[EducationRow],
        content: &DocumentContent,
        certificates: Vec<CertificateView>,
    ) -> Self {
        let contact_line = [
            Some(user.email.as_str()),
            user.phone.as_deref(),
            user.address.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" | ");

        let mut educations = educations.to_vec();
        educations.sort_by(|a, b| b.end_date.cmp(&a.end_date));

        Self {
            profile: ProfileView {
                full_name: user
                    .full_name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| user.username.clone()),
                contact_line,
            },
            educations: educations
                .into_iter()
                .map(|e| EducationView {
                    period: period(e.start_date, Some(e.end_date)),
                    gpa: e.gpa.map(|g| format!("{g:.2}")),
                    degree: e.degree,
                    institution: e.institution,
                    location: e.location,
                    honors: e.honors.filter(|h| !h.trim().is_empty()),
                })
                .collect(),
            experiences: content
                .experiences_by_recency()
                .into_iter()
                .map(experience_view)
                .collect(),
            projects: content
                .projects
                .iter()
                .map(|p| ProjectView {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    technologies: p.technologies.iter().map(|t| t.technology.clone()).collect(),
                    urls: p.urls.clone(),
                })
                .collect(),
            skill_groups: group_skills(content),
            publications: content
                .publications
                .iter()
                .map(|p| PublicationView {
                    title: p.title.clone(),
                    journal: p.journal.clone(),
                    year: p.year,
                })
                .collect(),
            certificates,
        }
    }
}

fn experience_view(exp: ExperienceItem) -> ExperienceView {
    let job_title = if exp.position.trim().is_empty() {
        exp.job_title
    } else {
        format!("{}, {}", exp.job_title, exp.position)
    };
    ExperienceView {
        job_title,
        period: period(exp.start_date, exp.end_date),
        description_lines: exp
            .description
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        company: exp.company,
        location: exp.location,
    }
}

fn period(start: NaiveDate, end: Option<NaiveDate>) -> String {
    let end = end
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| "Present".to_string());
    format!("{} - {end}", start.format("%b %Y"))
}

/// Skills grouped by category, categories in first-seen order.
fn group_skills(content: &DocumentContent) -> Vec<SkillGroup> {
    let mut groups: Vec<SkillGroup> = Vec::new();
    for skill in &content.technical_skills {
        let category = if skill.category.trim().is_empty() {
            "Other"
        } else {
            skill.category.trim()
        };
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.skills.push(skill.name.clone()),
            None => groups.push(SkillGroup {
                category: category.to_string(),
                skills: vec![skill.name.clone()],
            }),
        }
    }
    groups
}

fn latex_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(escape_latex(&text)))
}

fn latex_url_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let url = value.as_str().unwrap_or_default();
    let escaped: String = url
        .chars()
        .filter(|c| !matches!(c, '\\' | '{' | '}'))
        .flat_map(|c| match c {
            '%' => vec!['\\', '%'],
            '#' => vec!['\\', '#'],
            other => vec![other],
        })
        .collect();
    Ok(Value::String(escaped))
}

pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Holds the compiled résumé templates; built once at startup.
pub struct DocumentRenderer {
    tera: Tera,
}

impl DocumentRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        let mut sources = Vec::new();
        for (id, tex, html, _) in TEMPLATES {
            sources.push((format!("resume/{id}/template.tex"), *tex));
            sources.push((format!("resume/{id}/template.html"), *html));
        }
        tera.add_raw_templates(sources)?;
        tera.register_filter("latex", latex_filter);
        tera.register_filter("latex_url", latex_url_filter);
        Ok(Self { tera })
    }

    pub fn render_latex(&self, doc: &ResumeDocument, template: i32) -> Result<String, AppError> {
        self.render(doc, &format!("resume/{}/template.tex", checked(template)?))
    }

    pub fn render_html(&self, doc: &ResumeDocument, template: i32) -> Result<String, AppError> {
        self.render(doc, &format!("resume/{}/template.html", checked(template)?))
    }

    /// The document class shipped alongside a LaTeX template.
    pub fn class_file(&self, template: i32) -> Result<&'static str, AppError> {
        let template = checked(template)?;
        TEMPLATES
            .iter()
            .find(|(id, ..)| *id == template)
            .map(|(_, _, _, cls)| *cls)
            .ok_or_else(|| AppError::Validation(format!("Unknown CV template {template}")))
    }

    fn render(&self, doc: &ResumeDocument, name: &str) -> Result<String, AppError> {
        let context = Context::from_serialize(doc)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("template context: {e}")))?;
        self.tera
            .render(name, &context)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("rendering {name} failed: {e:?}")))
    }
}

pub fn is_valid_template(template: i32) -> bool {
    (1..=NUMBER_OF_CV_TEMPLATES).contains(&template)
}

fn checked(template: i32) -> Result<i32, AppError> {
    if is_valid_template(template) {
        Ok(template)
    } else {
        Err(AppError::Validation(format!("Unknown CV template {template}")))
    }
}
