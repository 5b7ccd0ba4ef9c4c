//! In-memory doubles for every external dependency of [`AppState`].
//!
//! `MemoryStore` implements all repository traits over one mutex-guarded
//! table set. Multi-statement writes run against a clone of the tables and
//! are committed only when every step succeeds, mirroring the transactions
//! of the PostgreSQL repositories.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::ai::{quota, AiUsageRepository, QuotaKind};
use crate::cache::DraftCache;
use crate::catalog::{
    DocumentContent, ExperienceItem, ProjectItem, PublicationItem, TechnicalSkillItem,
};
use crate::certificate::repository::{CertificateChanges, NewCertificate};
use crate::certificate::CertificateRepository;
use crate::config::{BucketNames, Config};
use crate::cv::repository::cv_not_found;
use crate::cv::CvRepository;
use crate::education::repository::EducationInput;
use crate::education::EducationRepository;
use crate::errors::AppError;
use crate::identity::{Claims, TokenVerifier, INVALID_TOKEN};
use crate::llm_client::{ChatModel, LlmError};
use crate::models::certificate::CertificationRow;
use crate::models::cv::{CvRow, CvSummaryRow, CvVersionRow};
use crate::models::education::EducationRow;
use crate::models::portfolio::PortfolioRow;
use crate::models::usage::AiUsageRow;
use crate::models::user::UserRow;
use crate::portfolio::repository::{PortfolioChanges, SLUG_TAKEN};
use crate::portfolio::PortfolioRepository;
use crate::render::{DocumentRenderer, LatexCompiler};
use crate::state::AppState;
use crate::storage::{Bucket, ObjectStorage};
use crate::users::repository::{NewUser, ProfileChanges};
use crate::users::UserRepository;

// ──────────────────────────────────────────────────────────────
// Repositories
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Owner {
    Cv(i64),
    Portfolio(i64),
}

#[derive(Debug, Clone, Default)]
struct Links {
    experiences: Vec<i64>,
    projects: Vec<i64>,
    publications: Vec<i64>,
    technical_skills: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRow>,
    educations: Vec<EducationRow>,
    certificates: Vec<CertificationRow>,
    cvs: Vec<CvRow>,
    versions: Vec<CvVersionRow>,
    portfolios: Vec<PortfolioRow>,
    usage: HashMap<String, AiUsageRow>,
    experiences: HashMap<i64, (String, ExperienceItem)>,
    projects: HashMap<i64, (String, ProjectItem)>,
    publications: HashMap<i64, (String, PublicationItem)>,
    skills: HashMap<i64, (String, TechnicalSkillItem)>,
    links: HashMap<Owner, Links>,
}

/// Inserts an item without id, or overwrites an existing item owned by `uid`.
fn upsert<T: Clone>(
    table: &mut HashMap<i64, (String, T)>,
    next_id: &mut i64,
    uid: &str,
    id: Option<i64>,
    item: &T,
    kind: &str,
) -> Result<i64, AppError> {
    match id {
        None => {
            *next_id += 1;
            table.insert(*next_id, (uid.to_string(), item.clone()));
            Ok(*next_id)
        }
        Some(id) => match table.get_mut(&id) {
            Some((owner, stored)) if owner.as_str() == uid => {
                *stored = item.clone();
                Ok(id)
            }
            _ => Err(AppError::NotFound(format!("{kind} {id} not found"))),
        },
    }
}

fn dedup(ids: Vec<i64>) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn resolve<T: Clone>(
    table: &HashMap<i64, (String, T)>,
    ids: &[i64],
    with_id: impl Fn(T, i64) -> T,
) -> Vec<T> {
    ids.iter()
        .filter_map(|id| table.get(id).map(|(_, item)| with_id(item.clone(), *id)))
        .collect()
}

impl Tables {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn replace_content(
        &mut self,
        owner: Owner,
        uid: &str,
        content: &DocumentContent,
    ) -> Result<DocumentContent, AppError> {
        let mut saved = content.without_repeated_ids();
        let mut links = Links::default();

        for exp in saved.experiences.iter_mut() {
            let id = upsert(
                &mut self.experiences,
                &mut self.next_id,
                uid,
                exp.id,
                exp,
                "Experience",
            )?;
            exp.id = Some(id);
            links.experiences.push(id);
        }
        for project in saved.projects.iter_mut() {
            let id = upsert(
                &mut self.projects,
                &mut self.next_id,
                uid,
                project.id,
                project,
                "Project",
            )?;
            project.id = Some(id);
            links.projects.push(id);
        }
        for publication in saved.publications.iter_mut() {
            let id = upsert(
                &mut self.publications,
                &mut self.next_id,
                uid,
                publication.id,
                publication,
                "Publication",
            )?;
            publication.id = Some(id);
            links.publications.push(id);
        }
        for skill in saved.technical_skills.iter_mut() {
            let id = upsert(
                &mut self.skills,
                &mut self.next_id,
                uid,
                skill.id,
                skill,
                "Technical skill",
            )?;
            skill.id = Some(id);
            links.technical_skills.push(id);
        }

        self.links.insert(
            owner,
            Links {
                experiences: dedup(links.experiences),
                projects: dedup(links.projects),
                publications: dedup(links.publications),
                technical_skills: dedup(links.technical_skills),
            },
        );
        Ok(saved)
    }

    fn content(&self, owner: Owner) -> DocumentContent {
        let links = self.links.get(&owner).cloned().unwrap_or_default();
        DocumentContent {
            experiences: resolve(&self.experiences, &links.experiences, |item, id| {
                ExperienceItem { id: Some(id), ..item }
            }),
            projects: resolve(&self.projects, &links.projects, |item, id| ProjectItem {
                id: Some(id),
                ..item
            }),
            publications: resolve(&self.publications, &links.publications, |item, id| {
                PublicationItem { id: Some(id), ..item }
            }),
            technical_skills: resolve(&self.skills, &links.technical_skills, |item, id| {
                TechnicalSkillItem { id: Some(id), ..item }
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Runs `f` against a copy of the tables and keeps the copy only on success.
    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut tables = self.lock();
        let mut draft = tables.clone();
        let out = f(&mut draft)?;
        *tables = draft;
        Ok(out)
    }

    pub fn certificate_path(&self, id: i64) -> Option<String> {
        self.lock()
            .certificates
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.link.clone())
    }

    pub fn experience_count(&self, uid: &str) -> usize {
        self.lock()
            .experiences
            .values()
            .filter(|(owner, _)| owner == uid)
            .count()
    }

    pub fn portfolio_image(&self, id: i64) -> Option<String> {
        self.lock()
            .portfolios
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| p.image_path.clone())
    }

    pub fn usage(&self, uid: &str) -> Option<AiUsageRow> {
        self.lock().usage.get(uid).cloned()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRow>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.uid == uid).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, AppError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRow, AppError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| {
            u.uid == user.uid || u.username == user.username || u.email == user.email
        }) {
            return Err(AppError::Conflict("User already exists".into()));
        }
        let now = Utc::now();
        let row = UserRow {
            id: tables.next(),
            uid: user.uid,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            img: user.img,
            address: None,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        uid: &str,
        changes: ProfileChanges,
    ) -> Result<Option<UserRow>, AppError> {
        let mut tables = self.lock();
        if let Some(username) = &changes.username {
            if tables
                .users
                .iter()
                .any(|u| &u.username == username && u.uid != uid)
            {
                return Err(AppError::Conflict("Username is unavailable".into()));
            }
        }
        let Some(user) = tables.users.iter_mut().find(|u| u.uid == uid) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(img) = changes.img {
            user.img = Some(img);
        }
        if let Some(address) = changes.address {
            user.address = Some(address);
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl EducationRepository for MemoryStore {
    async fn list(&self, uid: &str) -> Result<Vec<EducationRow>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .educations
            .iter()
            .filter(|e| e.user_id == uid)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.end_date.cmp(&a.end_date));
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<EducationRow>, AppError> {
        Ok(self
            .lock()
            .educations
            .iter()
            .find(|e| e.id == id && e.user_id == uid)
            .cloned())
    }

    async fn insert_many(
        &self,
        uid: &str,
        entries: &[EducationInput],
    ) -> Result<Vec<EducationRow>, AppError> {
        let mut tables = self.lock();
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let row = EducationRow {
                id: tables.next(),
                user_id: uid.to_string(),
                degree: entry.degree.clone(),
                institution: entry.institution.clone(),
                location: entry.location.clone(),
                start_date: entry.start_date,
                end_date: entry.end_date,
                gpa: entry.gpa,
                honors: entry.honors.clone(),
            };
            tables.educations.push(row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    async fn update(
        &self,
        uid: &str,
        id: i64,
        entry: &EducationInput,
    ) -> Result<Option<EducationRow>, AppError> {
        let mut tables = self.lock();
        let Some(row) = tables
            .educations
            .iter_mut()
            .find(|e| e.id == id && e.user_id == uid)
        else {
            return Ok(None);
        };
        row.degree = entry.degree.clone();
        row.institution = entry.institution.clone();
        row.location = entry.location.clone();
        row.start_date = entry.start_date;
        row.end_date = entry.end_date;
        row.gpa = entry.gpa;
        row.honors = entry.honors.clone();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        let before = tables.educations.len();
        tables.educations.retain(|e| !(e.id == id && e.user_id == uid));
        Ok(tables.educations.len() < before)
    }
}

#[async_trait]
impl CertificateRepository for MemoryStore {
    async fn list(&self, uid: &str) -> Result<Vec<CertificationRow>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .certificates
            .iter()
            .filter(|c| c.user_id == uid)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.issued_date.cmp(&a.issued_date));
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<CertificationRow>, AppError> {
        Ok(self
            .lock()
            .certificates
            .iter()
            .find(|c| c.id == id && c.user_id == uid)
            .cloned())
    }

    async fn insert_many(
        &self,
        uid: &str,
        certificates: &[NewCertificate],
    ) -> Result<Vec<CertificationRow>, AppError> {
        let mut tables = self.lock();
        let mut rows = Vec::with_capacity(certificates.len());
        for cert in certificates {
            let row = CertificationRow {
                id: tables.next(),
                user_id: uid.to_string(),
                title: cert.title.clone(),
                issuer: cert.issuer.clone(),
                issued_date: cert.issued_date,
                link: cert.link.clone(),
                created_at: Utc::now(),
            };
            tables.certificates.push(row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    async fn update(
        &self,
        uid: &str,
        id: i64,
        changes: &CertificateChanges,
    ) -> Result<Option<CertificationRow>, AppError> {
        let mut tables = self.lock();
        let Some(row) = tables
            .certificates
            .iter_mut()
            .find(|c| c.id == id && c.user_id == uid)
        else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            row.title = title.clone();
        }
        if let Some(issuer) = &changes.issuer {
            row.issuer = issuer.clone();
        }
        if let Some(date) = changes.issued_date {
            row.issued_date = date;
        }
        if let Some(link) = &changes.link {
            row.link = link.clone();
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        let before = tables.certificates.len();
        tables.certificates.retain(|c| !(c.id == id && c.user_id == uid));
        Ok(tables.certificates.len() < before)
    }
}

#[async_trait]
impl CvRepository for MemoryStore {
    async fn create(
        &self,
        uid: &str,
        cv_type: &str,
        title: &str,
        template: i32,
    ) -> Result<CvRow, AppError> {
        let mut tables = self.lock();
        let now = Utc::now();
        let row = CvRow {
            id: tables.next(),
            user_id: uid.to_string(),
            cv_type: cv_type.to_string(),
            title: title.to_string(),
            template,
            is_draft: true,
            bookmark: false,
            pdf_url: None,
            latest_saved_version_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.cvs.push(row.clone());
        Ok(row)
    }

    async fn list(&self, uid: &str) -> Result<Vec<CvSummaryRow>, AppError> {
        let tables = self.lock();
        let mut rows: Vec<_> = tables
            .cvs
            .iter()
            .filter(|c| c.user_id == uid)
            .map(|c| CvSummaryRow {
                id: c.id,
                cv_type: c.cv_type.clone(),
                title: c.title.clone(),
                template: c.template,
                is_draft: c.is_draft,
                bookmark: c.bookmark,
                latest_saved_version_id: c.latest_saved_version_id,
                version_number: c
                    .latest_saved_version_id
                    .and_then(|vid| tables.versions.iter().find(|v| v.id == vid))
                    .map_or(0, |v| v.version_number),
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn find(&self, uid: &str, cv_id: i64) -> Result<Option<CvRow>, AppError> {
        Ok(self
            .lock()
            .cvs
            .iter()
            .find(|c| c.id == cv_id && c.user_id == uid)
            .cloned())
    }

    async fn latest_version_number(&self, cv: &CvRow) -> Result<Option<i32>, AppError> {
        let Some(version_id) = cv.latest_saved_version_id else {
            return Ok(None);
        };
        Ok(self
            .lock()
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .map(|v| v.version_number))
    }

    async fn content(&self, cv_id: i64) -> Result<DocumentContent, AppError> {
        Ok(self.lock().content(Owner::Cv(cv_id)))
    }

    async fn update_meta(
        &self,
        uid: &str,
        cv_id: i64,
        title: Option<String>,
        bookmark: Option<bool>,
    ) -> Result<Option<CvRow>, AppError> {
        let mut tables = self.lock();
        let Some(cv) = tables
            .cvs
            .iter_mut()
            .find(|c| c.id == cv_id && c.user_id == uid)
        else {
            return Ok(None);
        };
        if let Some(title) = title {
            cv.title = title;
        }
        if let Some(bookmark) = bookmark {
            cv.bookmark = bookmark;
        }
        cv.updated_at = Utc::now();
        Ok(Some(cv.clone()))
    }

    async fn set_pdf_url(&self, cv_id: i64, path: &str) -> Result<(), AppError> {
        if let Some(cv) = self.lock().cvs.iter_mut().find(|c| c.id == cv_id) {
            cv.pdf_url = Some(path.to_string());
            cv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, uid: &str, cv_id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        let before = tables.cvs.len();
        tables.cvs.retain(|c| !(c.id == cv_id && c.user_id == uid));
        if tables.cvs.len() == before {
            return Ok(false);
        }
        tables.versions.retain(|v| v.cv_id != cv_id);
        tables.links.remove(&Owner::Cv(cv_id));
        Ok(true)
    }

    async fn save_version(
        &self,
        uid: &str,
        cv_id: i64,
        pdf_url: Option<&str>,
        content: &DocumentContent,
    ) -> Result<(CvRow, CvVersionRow), AppError> {
        self.transaction(|tables| {
            let position = tables
                .cvs
                .iter()
                .position(|c| c.id == cv_id && c.user_id == uid)
                .ok_or_else(cv_not_found)?;
            let previous = tables
                .versions
                .iter()
                .filter(|v| v.cv_id == cv_id)
                .max_by_key(|v| v.version_number)
                .map(|v| (v.id, v.version_number));

            let saved = tables.replace_content(Owner::Cv(cv_id), uid, content)?;
            let now = Utc::now();
            let version = CvVersionRow {
                id: tables.next(),
                cv_id,
                version_number: previous.map_or(1, |(_, number)| number + 1),
                pdf_url: pdf_url
                    .map(str::to_string)
                    .or_else(|| tables.cvs[position].pdf_url.clone())
                    .unwrap_or_default(),
                parent_version_id: previous.map(|(id, _)| id),
                content: Json(saved),
                created_at: now,
            };
            tables.versions.push(version.clone());

            let cv = &mut tables.cvs[position];
            cv.latest_saved_version_id = Some(version.id);
            cv.is_draft = false;
            cv.updated_at = now;
            Ok((cv.clone(), version))
        })
    }

    async fn versions(&self, cv_id: i64) -> Result<Vec<CvVersionRow>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .versions
            .iter()
            .filter(|v| v.cv_id == cv_id)
            .cloned()
            .collect();
        rows.sort_by_key(|v| v.version_number);
        Ok(rows)
    }

    async fn version(&self, cv_id: i64, number: i32) -> Result<Option<CvVersionRow>, AppError> {
        Ok(self
            .lock()
            .versions
            .iter()
            .find(|v| v.cv_id == cv_id && v.version_number == number)
            .cloned())
    }
}

#[async_trait]
impl PortfolioRepository for MemoryStore {
    async fn create(&self, uid: &str, theme: &str, title: &str) -> Result<PortfolioRow, AppError> {
        let mut tables = self.lock();
        let now = Utc::now();
        let row = PortfolioRow {
            id: tables.next(),
            user_id: uid.to_string(),
            theme: theme.to_string(),
            title: title.to_string(),
            bio: None,
            image_path: None,
            is_public: false,
            published_url: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.portfolios.push(row.clone());
        Ok(row)
    }

    async fn list(&self, uid: &str) -> Result<Vec<PortfolioRow>, AppError> {
        let mut rows: Vec<_> = self
            .lock()
            .portfolios
            .iter()
            .filter(|p| p.user_id == uid)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn find(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError> {
        Ok(self
            .lock()
            .portfolios
            .iter()
            .find(|p| p.id == id && p.user_id == uid)
            .cloned())
    }

    async fn content(&self, id: i64) -> Result<DocumentContent, AppError> {
        Ok(self.lock().content(Owner::Portfolio(id)))
    }

    async fn update(
        &self,
        uid: &str,
        id: i64,
        changes: PortfolioChanges,
        content: Option<&DocumentContent>,
    ) -> Result<Option<PortfolioRow>, AppError> {
        self.transaction(|tables| {
            let Some(position) = tables
                .portfolios
                .iter()
                .position(|p| p.id == id && p.user_id == uid)
            else {
                return Ok(None);
            };
            if let Some(content) = content {
                tables.replace_content(Owner::Portfolio(id), uid, content)?;
            }
            let row = &mut tables.portfolios[position];
            if let Some(title) = changes.title {
                row.title = title;
            }
            if let Some(bio) = changes.bio {
                row.bio = Some(bio);
            }
            if let Some(theme) = changes.theme {
                row.theme = theme;
            }
            if let Some(path) = changes.image_path {
                row.image_path = Some(path);
            }
            row.updated_at = Utc::now();
            Ok(Some(row.clone()))
        })
    }

    async fn delete(&self, uid: &str, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock();
        let before = tables.portfolios.len();
        tables.portfolios.retain(|p| !(p.id == id && p.user_id == uid));
        if tables.portfolios.len() == before {
            return Ok(false);
        }
        tables.links.remove(&Owner::Portfolio(id));
        Ok(true)
    }

    async fn publish(
        &self,
        uid: &str,
        id: i64,
        slug: &str,
    ) -> Result<Option<PortfolioRow>, AppError> {
        let mut tables = self.lock();
        if tables
            .portfolios
            .iter()
            .any(|p| p.id != id && p.published_url.as_deref() == Some(slug))
        {
            return Err(AppError::Conflict(SLUG_TAKEN.into()));
        }
        let Some(row) = tables
            .portfolios
            .iter_mut()
            .find(|p| p.id == id && p.user_id == uid)
        else {
            return Ok(None);
        };
        let now = Utc::now();
        row.published_url = Some(slug.to_string());
        row.is_public = true;
        row.published_at = Some(now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn unpublish(&self, uid: &str, id: i64) -> Result<Option<PortfolioRow>, AppError> {
        let mut tables = self.lock();
        let Some(row) = tables
            .portfolios
            .iter_mut()
            .find(|p| p.id == id && p.user_id == uid)
        else {
            return Ok(None);
        };
        row.published_url = None;
        row.is_public = false;
        row.published_at = None;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn find_public(&self, slug: &str) -> Result<Option<PortfolioRow>, AppError> {
        Ok(self
            .lock()
            .portfolios
            .iter()
            .find(|p| p.is_public && p.published_url.as_deref() == Some(slug))
            .cloned())
    }
}

#[async_trait]
impl AiUsageRepository for MemoryStore {
    async fn consume(
        &self,
        uid: &str,
        kind: QuotaKind,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.lock();
        let current = tables
            .usage
            .get(uid)
            .cloned()
            .unwrap_or_else(|| quota::fresh_usage(uid, now));
        let next = quota::consume(&current, kind, now)?;
        tables.usage.insert(uid.to_string(), next);
        Ok(())
    }
}

// ──────────────────────────────────────────────────────────────
// Storage, cache and upstream services
// ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<(Bucket, String), Bytes>>,
    /// Uploads still allowed to succeed; `None` means unlimited.
    upload_budget: Mutex<Option<usize>>,
}

impl MemoryStorage {
    /// Storage whose uploads fail once `successes` uploads went through.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            upload_budget: Mutex::new(Some(successes)),
            ..Default::default()
        }
    }

    pub fn contains(&self, bucket: Bucket, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket, path.to_string()))
    }

    pub fn object_count(&self, bucket: Bucket) -> usize {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| *b == bucket)
            .count()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), AppError> {
        if let Some(budget) = self.upload_budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                return Err(AppError::Storage(format!("upload of {path} refused")));
            }
            *budget -= 1;
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket, path.to_string()), body);
        Ok(())
    }

    async fn remove(&self, bucket: Bucket, path: &str) -> Result<(), AppError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket, path.to_string()));
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        Ok(format!(
            "https://storage.test/{bucket:?}/{path}?expires={}",
            expires_in.as_secs()
        ))
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Duration)>>,
}

impl MemoryCache {
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl DraftCache for MemoryCache {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Chat model returning a canned reply, or failing every call.
pub struct FakeLlm {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for FakeLlm {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or_else(|| LlmError::Api {
            status: 500,
            message: "model unavailable".into(),
        })
    }
}

pub struct FakeCompiler;

#[async_trait]
impl LatexCompiler for FakeCompiler {
    async fn compile(&self, _latex: &str, _class_file: &str) -> Result<Bytes, AppError> {
        Ok(Bytes::from_static(b"%PDF-1.7\n%fake\n"))
    }
}

/// Accepts `token-<uid>` and nothing else.
pub struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        match token.strip_prefix("token-") {
            Some(uid) if !uid.is_empty() => Ok(claims(uid)),
            _ => Err(AppError::Unauthorized(INVALID_TOKEN.into())),
        }
    }
}

pub fn claims(uid: &str) -> Claims {
    Claims {
        uid: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        name: Some(uid.to_string()),
        picture: None,
    }
}

// ──────────────────────────────────────────────────────────────
// Assembled state
// ──────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        environment: "test".into(),
        host: "127.0.0.1".into(),
        port: 8000,
        frontend_url: "http://localhost:3000".into(),
        database_url: "postgres://localhost/career_studio_test".into(),
        redis_host: "127.0.0.1".into(),
        redis_port: 6379,
        s3_endpoint: "http://localhost:9000".into(),
        s3_region: "us-east-1".into(),
        aws_access_key_id: "test".into(),
        aws_secret_access_key: "test".into(),
        buckets: BucketNames {
            certificates: "certificates".into(),
            cvs: "cvs".into(),
            portfolio_images: "portfolio-images".into(),
        },
        groq_api_key: "test".into(),
        google_api_key: "test".into(),
        firebase_project_id: "career-studio-test".into(),
        latex_compiler_url: "http://localhost:8080/builds/sync".into(),
        max_body_bytes: 20 * 1024 * 1024,
        rust_log: "info".into(),
    }
}

pub fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::default());
    AppState {
        config: test_config(),
        users: store.clone(),
        education: store.clone(),
        certificates: store.clone(),
        cvs: store.clone(),
        portfolios: store.clone(),
        usage: store,
        storage: Arc::new(MemoryStorage::default()),
        drafts: Arc::new(MemoryCache::default()),
        verifier: Arc::new(StaticVerifier),
        optimizer: Arc::new(FakeLlm::replying("Led a team of five engineers.")),
        analyzer: Arc::new(FakeLlm::failing()),
        compiler: Arc::new(FakeCompiler),
        renderer: Arc::new(DocumentRenderer::new().expect("templates compile")),
    }
}

/// Inserts the `users` row that owned tables reference.
pub async fn insert_user(pool: &PgPool, uid: &str) {
    sqlx::query("INSERT INTO users (uid, username, email) VALUES ($1, $1, $1 || '@example.com')")
        .bind(uid)
        .execute(pool)
        .await
        .expect("user row inserts");
}
