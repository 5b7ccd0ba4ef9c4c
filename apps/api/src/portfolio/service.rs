use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{
    PortfolioAutosaveRequest, PortfolioDetail, PortfolioListItem, PortfolioOut, PublicPortfolio,
    Theme,
};
use super::repository::{
    portfolio_not_found, PortfolioChanges, PortfolioRepository, SLUG_TAKEN,
};
use crate::cache::{load_draft, portfolio_draft_key, store_draft, DraftCache};
use crate::catalog::{ExperienceItem, ProjectItem, PublicationItem, TechnicalSkillItem};
use crate::cv::models::AutosaveResponse;
use crate::errors::AppError;
use crate::forms::{FormFields, UploadedFile};
use crate::models::portfolio::PortfolioRow;
use crate::storage::{object_path, Bucket, ObjectStorage, DEFAULT_SIGNED_URL_TTL};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const SLUG_LENGTH: usize = 12;
const PUBLISH_ATTEMPTS: usize = 3;

/// A parsed `PATCH /portfolio/update` form. Content sections left out of the
/// form keep their saved value.
#[derive(Debug, Default)]
pub struct PortfolioUpdate {
    pub portfolio_id: i64,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub theme: Option<Theme>,
    pub experiences: Option<Vec<ExperienceItem>>,
    pub projects: Option<Vec<ProjectItem>>,
    pub publications: Option<Vec<PublicationItem>>,
    pub technical_skills: Option<Vec<TechnicalSkillItem>>,
    pub image: Option<UploadedFile>,
}

impl PortfolioUpdate {
    pub fn from_form(form: &mut FormFields) -> Result<Self, AppError> {
        let portfolio_id = form
            .text("portfolio_id")
            .ok_or_else(|| AppError::Validation("portfolio_id is required".into()))?
            .parse()
            .map_err(|_| AppError::Validation("portfolio_id must be an integer".into()))?;

        Ok(Self {
            portfolio_id,
            title: form.text("title").map(str::to_string),
            bio: form.text("bio").map(str::to_string),
            theme: form.text("theme").map(Theme::parse).transpose()?,
            experiences: json_field(form, "experiences")?,
            projects: json_field(form, "projects")?,
            publications: json_field(form, "publications")?,
            technical_skills: json_field(form, "technical_skills")?,
            image: form.take_file("image"),
        })
    }

    fn touches_content(&self) -> bool {
        self.experiences.is_some()
            || self.projects.is_some()
            || self.publications.is_some()
            || self.technical_skills.is_some()
    }
}

fn json_field<T: DeserializeOwned>(form: &FormFields, name: &str) -> Result<Option<T>, AppError> {
    form.text(name)
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| AppError::Validation(format!("Invalid JSON in '{name}': {e}")))
        })
        .transpose()
}

/// Accepted image types, keyed by content type, with the extension they are stored under.
pub fn image_extension(file: &UploadedFile) -> Result<&'static str, AppError> {
    let by_type = match file.content_type.as_deref() {
        Some("image/jpeg") => Some(".jpg"),
        Some("image/png") => Some(".png"),
        Some("image/webp") => Some(".webp"),
        _ => None,
    };
    let ext = by_type.or_else(|| match file.extension().as_deref() {
        Some(".jpg" | ".jpeg") => Some(".jpg"),
        Some(".png") => Some(".png"),
        Some(".webp") => Some(".webp"),
        _ => None,
    });
    let ext = ext.ok_or_else(|| {
        AppError::Validation("Only JPEG, PNG or WebP images are supported.".into())
    })?;
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::PayloadTooLarge("Image size exceeds 5MB limit.".into()));
    }
    Ok(ext)
}

fn image_content_type(ext: &str) -> &'static str {
    match ext {
        ".png" => "image/png",
        ".webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Twelve lowercase alphanumerics.
pub fn random_slug<R: Rng>(rng: &mut R) -> String {
    (0..SLUG_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}

async fn image_url(
    storage: &dyn ObjectStorage,
    row: &PortfolioRow,
) -> Result<Option<String>, AppError> {
    match row.image_path.as_deref() {
        Some(path) => Ok(Some(
            storage
                .signed_url(Bucket::PortfolioImages, path, DEFAULT_SIGNED_URL_TTL)
                .await?,
        )),
        None => Ok(None),
    }
}

async fn to_out(storage: &dyn ObjectStorage, row: PortfolioRow) -> Result<PortfolioOut, AppError> {
    let url = image_url(storage, &row).await?;
    Ok(PortfolioOut::new(row, url))
}

pub async fn create(
    repo: &dyn PortfolioRepository,
    uid: &str,
    theme: &str,
) -> Result<i64, AppError> {
    let theme = Theme::parse(theme)?;
    let title = format!(
        "Portfolio-{}-{}",
        &Uuid::new_v4().simple().to_string()[..8],
        theme.as_str()
    );
    let row = repo.create(uid, theme.as_str(), &title).await?;
    info!("Created portfolio {} for {uid}", row.id);
    Ok(row.id)
}

pub async fn list(
    repo: &dyn PortfolioRepository,
    uid: &str,
) -> Result<Vec<PortfolioListItem>, AppError> {
    Ok(repo.list(uid).await?.into_iter().map(PortfolioListItem::from).collect())
}

pub async fn get(
    repo: &dyn PortfolioRepository,
    cache: &dyn DraftCache,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
) -> Result<PortfolioDetail, AppError> {
    let row = repo.find(uid, id).await?.ok_or_else(portfolio_not_found)?;
    let draft = load_draft(cache, &portfolio_draft_key(id), uid).await?;
    let (content, has_unsaved_changes) = match draft {
        Some(draft) => (draft.draft_content, true),
        None => (repo.content(id).await?, false),
    };
    Ok(PortfolioDetail {
        portfolio: to_out(storage, row).await?,
        has_unsaved_changes,
        content,
    })
}

pub async fn update(
    repo: &dyn PortfolioRepository,
    cache: &dyn DraftCache,
    storage: &dyn ObjectStorage,
    uid: &str,
    update: PortfolioUpdate,
) -> Result<PortfolioDetail, AppError> {
    let id = update.portfolio_id;
    let current = repo.find(uid, id).await?.ok_or_else(portfolio_not_found)?;
    let image_ext = update.image.as_ref().map(image_extension).transpose()?;

    let content = if update.touches_content() {
        let mut content = repo.content(id).await?;
        if let Some(experiences) = update.experiences {
            content.experiences = experiences;
        }
        if let Some(projects) = update.projects {
            content.projects = projects;
        }
        if let Some(publications) = update.publications {
            content.publications = publications;
        }
        if let Some(skills) = update.technical_skills {
            content.technical_skills = skills;
        }
        content.validate()?;
        Some(content)
    } else {
        None
    };

    let image_path = match (update.image, image_ext) {
        (Some(file), Some(ext)) => {
            let path = object_path(uid, ext);
            storage
                .upload(Bucket::PortfolioImages, &path, file.bytes, image_content_type(ext))
                .await?;
            Some(path)
        }
        _ => None,
    };

    let changes = PortfolioChanges {
        title: update.title,
        bio: update.bio,
        theme: update.theme.map(|t| t.as_str().to_string()),
        image_path: image_path.clone(),
    };
    let row = match repo.update(uid, id, changes, content.as_ref()).await {
        Ok(Some(row)) => row,
        outcome => {
            if let Some(path) = &image_path {
                if let Err(e) = storage.remove(Bucket::PortfolioImages, path).await {
                    warn!("Could not remove unused portfolio image {path}: {e}");
                }
            }
            return Err(outcome.err().unwrap_or_else(portfolio_not_found));
        }
    };

    // Only after the row points at the new image is the old one unreferenced.
    if let (Some(_), Some(old)) = (&image_path, current.image_path.as_deref()) {
        if let Err(e) = storage.remove(Bucket::PortfolioImages, old).await {
            warn!("Portfolio {id} image replaced but {old} could not be removed: {e}");
        }
    }

    if let Err(e) = cache.delete(&portfolio_draft_key(id)).await {
        warn!("Portfolio {id} updated but its draft could not be cleared: {e}");
    }

    let content = repo.content(id).await?;
    Ok(PortfolioDetail {
        portfolio: to_out(storage, row).await?,
        has_unsaved_changes: false,
        content,
    })
}

pub async fn autosave(
    repo: &dyn PortfolioRepository,
    cache: &dyn DraftCache,
    uid: &str,
    req: PortfolioAutosaveRequest,
) -> Result<AutosaveResponse, AppError> {
    repo.find(uid, req.portfolio_id)
        .await?
        .ok_or_else(portfolio_not_found)?;
    let envelope = store_draft(
        cache,
        &portfolio_draft_key(req.portfolio_id),
        uid,
        &req.draft_content,
    )
    .await?;
    Ok(AutosaveResponse {
        message: "Draft saved".into(),
        timestamp: envelope.timestamp,
    })
}

pub async fn delete(
    repo: &dyn PortfolioRepository,
    cache: &dyn DraftCache,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
) -> Result<(), AppError> {
    let row = repo.find(uid, id).await?.ok_or_else(portfolio_not_found)?;
    if !repo.delete(uid, id).await? {
        return Err(portfolio_not_found());
    }
    if let Err(e) = cache.delete(&portfolio_draft_key(id)).await {
        warn!("Could not clear draft of deleted portfolio {id}: {e}");
    }
    if let Some(path) = row.image_path {
        if let Err(e) = storage.remove(Bucket::PortfolioImages, &path).await {
            warn!("Could not remove image of deleted portfolio {id}: {e}");
        }
    }
    info!("Deleted portfolio {id}");
    Ok(())
}

pub async fn publish(
    repo: &dyn PortfolioRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
) -> Result<PortfolioOut, AppError> {
    publish_with(repo, storage, uid, id, || random_slug(&mut rand::thread_rng())).await
}

/// Publishes under slugs drawn from `next_slug`, drawing again when a slug
/// is already taken.
pub(crate) async fn publish_with<F>(
    repo: &dyn PortfolioRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
    mut next_slug: F,
) -> Result<PortfolioOut, AppError>
where
    F: FnMut() -> String,
{
    for attempt in 1..=PUBLISH_ATTEMPTS {
        let slug = next_slug();
        match repo.publish(uid, id, &slug).await {
            Ok(Some(row)) => {
                info!("Published portfolio {id} as {slug}");
                return to_out(storage, row).await;
            }
            Ok(None) => return Err(portfolio_not_found()),
            Err(AppError::Conflict(_)) => {
                warn!("Slug collision while publishing portfolio {id} (attempt {attempt})");
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::Conflict(SLUG_TAKEN.into()))
}

pub async fn unpublish(
    repo: &dyn PortfolioRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    id: i64,
) -> Result<PortfolioOut, AppError> {
    let row = repo
        .unpublish(uid, id)
        .await?
        .ok_or_else(portfolio_not_found)?;
    info!("Unpublished portfolio {id}");
    to_out(storage, row).await
}

/// Anonymous read by slug. Internal ids never leave this function.
pub async fn public(
    repo: &dyn PortfolioRepository,
    storage: &dyn ObjectStorage,
    slug: &str,
) -> Result<PublicPortfolio, AppError> {
    let row = repo
        .find_public(slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Portfolio not found or not public".into()))?;
    let content = repo.content(row.id).await?.without_ids();
    let image_url = image_url(storage, &row).await?;
    Ok(PublicPortfolio {
        title: row.title,
        theme: row.theme,
        bio: row.bio,
        image_url,
        published_at: row.published_at,
        content,
    })
}
