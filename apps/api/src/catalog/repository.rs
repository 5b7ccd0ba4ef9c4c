use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{
    DocumentContent, ExperienceItem, ProjectItem, ProjectTechnologyItem, PublicationItem,
    ResourceUrlItem, SourceType, TechnicalSkillItem,
};
use crate::errors::AppError;

/// Join tables that attach catalog items to one kind of owning document.
pub struct LinkTables {
    pub owner_column: &'static str,
    pub experiences: &'static str,
    pub projects: &'static str,
    pub publications: &'static str,
    pub technical_skills: &'static str,
}

pub const CV_LINKS: LinkTables = LinkTables {
    owner_column: "cv_id",
    experiences: "cv_experiences",
    projects: "cv_projects",
    publications: "cv_publications",
    technical_skills: "cv_technical_skills",
};

pub const PORTFOLIO_LINKS: LinkTables = LinkTables {
    owner_column: "portfolio_id",
    experiences: "portfolio_experiences",
    projects: "portfolio_projects",
    publications: "portfolio_publications",
    technical_skills: "portfolio_technical_skills",
};

impl LinkTables {
    fn all(&self) -> [&'static str; 4] {
        [
            self.experiences,
            self.projects,
            self.publications,
            self.technical_skills,
        ]
    }
}

#[derive(FromRow)]
struct ExperienceRow {
    id: i64,
    job_title: String,
    position: String,
    company: String,
    company_url: Option<String>,
    company_logo: Option<String>,
    location: String,
    employment_type: String,
    location_type: String,
    industry: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    description: String,
}

#[derive(FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    description: String,
}

#[derive(FromRow)]
struct PublicationRow {
    id: i64,
    title: String,
    journal: String,
    year: i32,
}

#[derive(FromRow)]
struct TechnicalSkillRow {
    id: i64,
    name: String,
    category: String,
}

#[derive(FromRow)]
struct TechnologyRow {
    project_id: i64,
    technology: String,
}

#[derive(FromRow)]
struct ResourceUrlRow {
    source_id: i64,
    label: String,
    url: String,
}

// ──────────────────────────────────────────────────────────────
// Writes
// ──────────────────────────────────────────────────────────────

/// Rewrites every link of one document inside the caller's transaction.
///
/// Existing links are dropped, items are upserted for `uid` and linked again
/// in payload order. Returns the content with the ids that were assigned.
/// An id that does not belong to `uid` aborts with `NotFound`; the caller's
/// transaction is then dropped and rolled back.
pub async fn replace_content(
    tx: &mut Transaction<'_, Postgres>,
    links: &LinkTables,
    uid: &str,
    owner_id: i64,
    content: &DocumentContent,
) -> Result<DocumentContent, AppError> {
    for table in links.all() {
        sqlx::query(&format!(
            "DELETE FROM {table} WHERE {} = $1",
            links.owner_column
        ))
        .bind(owner_id)
        .execute(&mut **tx)
        .await?;
    }

    let mut saved = content.without_repeated_ids();

    let mut ids = Vec::with_capacity(saved.experiences.len());
    for exp in saved.experiences.iter_mut() {
        let id = upsert_experience(tx, uid, exp).await?;
        exp.id = Some(id);
        ids.push(id);
    }
    link_items(tx, links.experiences, links.owner_column, owner_id, &ids).await?;

    let mut ids = Vec::with_capacity(saved.projects.len());
    for project in saved.projects.iter_mut() {
        let id = upsert_project(tx, uid, project).await?;
        replace_technologies(tx, id, &project.technologies).await?;
        replace_urls(tx, SourceType::Project, id, &project.urls).await?;
        project.id = Some(id);
        ids.push(id);
    }
    link_items(tx, links.projects, links.owner_column, owner_id, &ids).await?;

    let mut ids = Vec::with_capacity(saved.publications.len());
    for publication in saved.publications.iter_mut() {
        let id = upsert_publication(tx, uid, publication).await?;
        replace_urls(tx, SourceType::Publication, id, &publication.urls).await?;
        publication.id = Some(id);
        ids.push(id);
    }
    link_items(tx, links.publications, links.owner_column, owner_id, &ids).await?;

    let mut ids = Vec::with_capacity(saved.technical_skills.len());
    for skill in saved.technical_skills.iter_mut() {
        let id = upsert_skill(tx, uid, skill).await?;
        skill.id = Some(id);
        ids.push(id);
    }
    link_items(tx, links.technical_skills, links.owner_column, owner_id, &ids).await?;

    Ok(saved)
}

async fn link_items(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    owner_column: &str,
    owner_id: i64,
    ids: &[i64],
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    let sql =
        format!("INSERT INTO {table} ({owner_column}, item_id, position) VALUES ($1, $2, $3)");
    for (position, id) in ids.iter().filter(|id| seen.insert(**id)).enumerate() {
        sqlx::query(&sql)
            .bind(owner_id)
            .bind(id)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn upsert_experience(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    exp: &ExperienceItem,
) -> Result<i64, AppError> {
    let id: Option<i64> = match exp.id {
        None => Some(
            sqlx::query_scalar(
                r#"
                INSERT INTO experiences
                    (user_id, job_title, position, company, company_url, company_logo,
                     location, employment_type, location_type, industry,
                     start_date, end_date, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id
                "#,
            )
            .bind(uid)
            .bind(&exp.job_title)
            .bind(&exp.position)
            .bind(&exp.company)
            .bind(&exp.company_url)
            .bind(&exp.company_logo)
            .bind(&exp.location)
            .bind(&exp.employment_type)
            .bind(&exp.location_type)
            .bind(&exp.industry)
            .bind(exp.start_date)
            .bind(exp.end_date)
            .bind(&exp.description)
            .fetch_one(&mut **tx)
            .await?,
        ),
        Some(id) => {
            sqlx::query_scalar(
                r#"
                UPDATE experiences
                SET job_title = $3, position = $4, company = $5, company_url = $6,
                    company_logo = $7, location = $8, employment_type = $9,
                    location_type = $10, industry = $11, start_date = $12,
                    end_date = $13, description = $14
                WHERE id = $1 AND user_id = $2
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(uid)
            .bind(&exp.job_title)
            .bind(&exp.position)
            .bind(&exp.company)
            .bind(&exp.company_url)
            .bind(&exp.company_logo)
            .bind(&exp.location)
            .bind(&exp.employment_type)
            .bind(&exp.location_type)
            .bind(&exp.industry)
            .bind(exp.start_date)
            .bind(exp.end_date)
            .bind(&exp.description)
            .fetch_optional(&mut **tx)
            .await?
        }
    };
    id.ok_or_else(|| {
        AppError::NotFound(format!("Experience {} not found", exp.id.unwrap_or_default()))
    })
}

async fn upsert_project(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    project: &ProjectItem,
) -> Result<i64, AppError> {
    let id: Option<i64> = match project.id {
        None => Some(
            sqlx::query_scalar(
                "INSERT INTO projects (user_id, name, description) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(uid)
            .bind(&project.name)
            .bind(&project.description)
            .fetch_one(&mut **tx)
            .await?,
        ),
        Some(id) => {
            sqlx::query_scalar(
                "UPDATE projects SET name = $3, description = $4 WHERE id = $1 AND user_id = $2 RETURNING id",
            )
            .bind(id)
            .bind(uid)
            .bind(&project.name)
            .bind(&project.description)
            .fetch_optional(&mut **tx)
            .await?
        }
    };
    id.ok_or_else(|| {
        AppError::NotFound(format!("Project {} not found", project.id.unwrap_or_default()))
    })
}

async fn upsert_publication(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    publication: &PublicationItem,
) -> Result<i64, AppError> {
    let id: Option<i64> = match publication.id {
        None => Some(
            sqlx::query_scalar(
                "INSERT INTO publications (user_id, title, journal, year) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(uid)
            .bind(&publication.title)
            .bind(&publication.journal)
            .bind(publication.year)
            .fetch_one(&mut **tx)
            .await?,
        ),
        Some(id) => {
            sqlx::query_scalar(
                r#"
                UPDATE publications SET title = $3, journal = $4, year = $5
                WHERE id = $1 AND user_id = $2
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(uid)
            .bind(&publication.title)
            .bind(&publication.journal)
            .bind(publication.year)
            .fetch_optional(&mut **tx)
            .await?
        }
    };
    id.ok_or_else(|| {
        AppError::NotFound(format!(
            "Publication {} not found",
            publication.id.unwrap_or_default()
        ))
    })
}

async fn upsert_skill(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    skill: &TechnicalSkillItem,
) -> Result<i64, AppError> {
    let id: Option<i64> = match skill.id {
        None => Some(
            sqlx::query_scalar(
                "INSERT INTO technical_skills (user_id, name, category) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(uid)
            .bind(&skill.name)
            .bind(&skill.category)
            .fetch_one(&mut **tx)
            .await?,
        ),
        Some(id) => {
            sqlx::query_scalar(
                "UPDATE technical_skills SET name = $3, category = $4 WHERE id = $1 AND user_id = $2 RETURNING id",
            )
            .bind(id)
            .bind(uid)
            .bind(&skill.name)
            .bind(&skill.category)
            .fetch_optional(&mut **tx)
            .await?
        }
    };
    id.ok_or_else(|| {
        AppError::NotFound(format!(
            "Technical skill {} not found",
            skill.id.unwrap_or_default()
        ))
    })
}

/// Child rows are never diffed: delete all, then recreate.
async fn replace_technologies(
    tx: &mut Transaction<'_, Postgres>,
    project_id: i64,
    technologies: &[ProjectTechnologyItem],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM project_technologies WHERE project_id = $1")
        .bind(project_id)
        .execute(&mut **tx)
        .await?;
    for tech in technologies {
        sqlx::query("INSERT INTO project_technologies (project_id, technology) VALUES ($1, $2)")
            .bind(project_id)
            .bind(&tech.technology)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn replace_urls(
    tx: &mut Transaction<'_, Postgres>,
    source_type: SourceType,
    source_id: i64,
    urls: &[ResourceUrlItem],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM resource_urls WHERE source_type = $1 AND source_id = $2")
        .bind(source_type.as_str())
        .bind(source_id)
        .execute(&mut **tx)
        .await?;
    for url in urls {
        sqlx::query(
            "INSERT INTO resource_urls (source_id, source_type, label, url) VALUES ($1, $2, $3, $4)",
        )
        .bind(source_id)
        .bind(source_type.as_str())
        .bind(&url.label)
        .bind(&url.url)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ──────────────────────────────────────────────────────────────
// Reads
// ──────────────────────────────────────────────────────────────

/// Loads the linked content of one document in link order.
pub async fn load_content(
    pool: &PgPool,
    links: &LinkTables,
    owner_id: i64,
) -> Result<DocumentContent, AppError> {
    let owner = links.owner_column;

    let experiences: Vec<ExperienceRow> = sqlx::query_as(&format!(
        "SELECT e.* FROM experiences e JOIN {} l ON l.item_id = e.id WHERE l.{owner} = $1 ORDER BY l.position",
        links.experiences
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    let projects: Vec<ProjectRow> = sqlx::query_as(&format!(
        "SELECT p.id, p.name, p.description FROM projects p JOIN {} l ON l.item_id = p.id WHERE l.{owner} = $1 ORDER BY l.position",
        links.projects
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    let publications: Vec<PublicationRow> = sqlx::query_as(&format!(
        "SELECT p.id, p.title, p.journal, p.year FROM publications p JOIN {} l ON l.item_id = p.id WHERE l.{owner} = $1 ORDER BY l.position",
        links.publications
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    let skills: Vec<TechnicalSkillRow> = sqlx::query_as(&format!(
        "SELECT s.id, s.name, s.category FROM technical_skills s JOIN {} l ON l.item_id = s.id WHERE l.{owner} = $1 ORDER BY l.position",
        links.technical_skills
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    let project_ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    let publication_ids: Vec<i64> = publications.iter().map(|p| p.id).collect();

    let technologies: Vec<TechnologyRow> = sqlx::query_as(
        "SELECT project_id, technology FROM project_technologies WHERE project_id = ANY($1) ORDER BY id",
    )
    .bind(&project_ids)
    .fetch_all(pool)
    .await?;
    let mut technologies_by_project: HashMap<i64, Vec<ProjectTechnologyItem>> = HashMap::new();
    for row in technologies {
        technologies_by_project
            .entry(row.project_id)
            .or_default()
            .push(ProjectTechnologyItem {
                technology: row.technology,
            });
    }

    let mut project_urls = load_urls(pool, SourceType::Project, &project_ids).await?;
    let mut publication_urls = load_urls(pool, SourceType::Publication, &publication_ids).await?;

    Ok(DocumentContent {
        experiences: experiences
            .into_iter()
            .map(|e| ExperienceItem {
                id: Some(e.id),
                job_title: e.job_title,
                position: e.position,
                company: e.company,
                company_url: e.company_url,
                company_logo: e.company_logo,
                location: e.location,
                employment_type: e.employment_type,
                location_type: e.location_type,
                industry: e.industry,
                start_date: e.start_date,
                end_date: e.end_date,
                description: e.description,
            })
            .collect(),
        projects: projects
            .into_iter()
            .map(|p| ProjectItem {
                id: Some(p.id),
                technologies: technologies_by_project.remove(&p.id).unwrap_or_default(),
                urls: project_urls.remove(&p.id).unwrap_or_default(),
                name: p.name,
                description: p.description,
            })
            .collect(),
        publications: publications
            .into_iter()
            .map(|p| PublicationItem {
                id: Some(p.id),
                urls: publication_urls.remove(&p.id).unwrap_or_default(),
                title: p.title,
                journal: p.journal,
                year: p.year,
            })
            .collect(),
        technical_skills: skills
            .into_iter()
            .map(|s| TechnicalSkillItem {
                id: Some(s.id),
                name: s.name,
                category: s.category,
            })
            .collect(),
    })
}

async fn load_urls(
    pool: &PgPool,
    source_type: SourceType,
    source_ids: &[i64],
) -> Result<HashMap<i64, Vec<ResourceUrlItem>>, AppError> {
    let rows: Vec<ResourceUrlRow> = sqlx::query_as(
        "SELECT source_id, label, url FROM resource_urls WHERE source_type = $1 AND source_id = ANY($2) ORDER BY id",
    )
    .bind(source_type.as_str())
    .bind(source_ids)
    .fetch_all(pool)
    .await?;

    let mut by_source: HashMap<i64, Vec<ResourceUrlItem>> = HashMap::new();
    for row in rows {
        by_source.entry(row.source_id).or_default().push(ResourceUrlItem {
            label: row.label,
            url: row.url,
        });
    }
    Ok(by_source)
}
