use tracing::{info, warn};
use uuid::Uuid;

use super::models::{
    AutosaveRequest, AutosaveResponse, CreateCvRequest, CvDetail, CvListItem, CvOut, CvType,
    GenerateRequest, RenderRequest, SaveRequest, UpdateCvRequest, VersionOut,
};
use super::repository::{cv_not_found, CvRepository};
use crate::cache::{cv_draft_key, load_draft, store_draft, DraftCache};
use crate::catalog::DocumentContent;
use crate::certificate::CertificateRepository;
use crate::education::EducationRepository;
use crate::errors::AppError;
use crate::models::cv::CvRow;
use crate::render::{is_valid_template, CertificateView, ResumeDocument};
use crate::state::AppState;
use crate::storage::{
    object_path, Bucket, ObjectStorage, DEFAULT_SIGNED_URL_TTL, RENDER_SIGNED_URL_TTL,
};
use crate::users::service::user_not_found;
use crate::users::UserRepository;

pub async fn create(
    cvs: &dyn CvRepository,
    uid: &str,
    req: CreateCvRequest,
) -> Result<i64, AppError> {
    let cv_type = CvType::parse(&req.cv_type)?;
    if !is_valid_template(req.template) {
        return Err(AppError::Validation("Invalid CV template".into()));
    }
    let title = format!("CV-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let cv = cvs.create(uid, cv_type.as_str(), &title, req.template).await?;
    info!("Created CV {} for {uid}", cv.id);
    Ok(cv.id)
}

pub async fn list(cvs: &dyn CvRepository, uid: &str) -> Result<Vec<CvListItem>, AppError> {
    Ok(cvs.list(uid).await?.into_iter().map(CvListItem::from).collect())
}

async fn owned(cvs: &dyn CvRepository, uid: &str, cv_id: i64) -> Result<CvRow, AppError> {
    cvs.find(uid, cv_id).await?.ok_or_else(cv_not_found)
}

/// Ownership is checked before the draft cache is consulted.
pub async fn get(
    cvs: &dyn CvRepository,
    cache: &dyn DraftCache,
    uid: &str,
    cv_id: i64,
) -> Result<CvDetail, AppError> {
    let cv = owned(cvs, uid, cv_id).await?;
    let version_number = cvs.latest_version_number(&cv).await?;

    let (content, has_unsaved_changes) = match load_draft(cache, &cv_draft_key(cv_id), uid).await? {
        Some(draft) => (draft.draft_content, true),
        None => (cvs.content(cv_id).await?, false),
    };

    Ok(CvDetail {
        cv: CvOut::new(cv, version_number),
        has_unsaved_changes,
        content,
    })
}

pub async fn update_meta(
    cvs: &dyn CvRepository,
    uid: &str,
    cv_id: i64,
    req: UpdateCvRequest,
) -> Result<CvOut, AppError> {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("CV title cannot be empty".into()));
        }
    }
    let cv = cvs
        .update_meta(uid, cv_id, req.title.map(|t| t.trim().to_string()), req.bookmark)
        .await?
        .ok_or_else(cv_not_found)?;
    let version_number = cvs.latest_version_number(&cv).await?;
    Ok(CvOut::new(cv, version_number))
}

pub async fn delete(
    cvs: &dyn CvRepository,
    cache: &dyn DraftCache,
    storage: &dyn ObjectStorage,
    uid: &str,
    cv_id: i64,
) -> Result<(), AppError> {
    let cv = owned(cvs, uid, cv_id).await?;
    if !cvs.delete(uid, cv_id).await? {
        return Err(cv_not_found());
    }
    if let Err(e) = cache.delete(&cv_draft_key(cv_id)).await {
        warn!("Could not clear draft of deleted CV {cv_id}: {e}");
    }
    if let Some(path) = cv.pdf_url {
        if let Err(e) = storage.remove(Bucket::Cvs, &path).await {
            warn!("Could not remove PDF of deleted CV {cv_id}: {e}");
        }
    }
    info!("Deleted CV {cv_id}");
    Ok(())
}

pub async fn versions(
    cvs: &dyn CvRepository,
    uid: &str,
    cv_id: i64,
) -> Result<Vec<VersionOut>, AppError> {
    owned(cvs, uid, cv_id).await?;
    Ok(cvs.versions(cv_id).await?.into_iter().map(VersionOut::from).collect())
}

pub async fn version(
    cvs: &dyn CvRepository,
    uid: &str,
    cv_id: i64,
    number: i32,
) -> Result<VersionOut, AppError> {
    owned(cvs, uid, cv_id).await?;
    cvs.version(cv_id, number)
        .await?
        .map(VersionOut::from)
        .ok_or_else(|| AppError::NotFound(format!("Version {number} not found")))
}

pub async fn autosave(
    cvs: &dyn CvRepository,
    cache: &dyn DraftCache,
    uid: &str,
    req: AutosaveRequest,
) -> Result<AutosaveResponse, AppError> {
    owned(cvs, uid, req.cv_id).await?;
    let envelope = store_draft(cache, &cv_draft_key(req.cv_id), uid, &req.draft_content).await?;
    Ok(AutosaveResponse {
        message: "Draft saved".into(),
        timestamp: envelope.timestamp,
    })
}

pub async fn save(
    cvs: &dyn CvRepository,
    cache: &dyn DraftCache,
    uid: &str,
    req: SaveRequest,
) -> Result<CvOut, AppError> {
    owned(cvs, uid, req.cv_id).await?;
    req.content.validate()?;
    let (cv, version) = cvs
        .save_version(uid, req.cv_id, req.pdf_url.as_deref(), &req.content)
        .await?;
    if let Err(e) = cache.delete(&cv_draft_key(req.cv_id)).await {
        warn!("CV {} saved but its draft could not be cleared: {e}", req.cv_id);
    }
    Ok(CvOut::new(cv, Some(version.version_number)))
}

/// Gathers everything a résumé template needs besides the CV content.
async fn resume_document(
    users: &dyn UserRepository,
    education: &dyn EducationRepository,
    certificates: &dyn CertificateRepository,
    storage: &dyn ObjectStorage,
    uid: &str,
    content: &DocumentContent,
) -> Result<ResumeDocument, AppError> {
    let user = users.find_by_uid(uid).await?.ok_or_else(user_not_found)?;
    let educations = education.list(uid).await?;

    let mut certificate_views = Vec::new();
    for cert in certificates.list(uid).await? {
        let link = storage
            .signed_url(Bucket::Certificates, &cert.link, RENDER_SIGNED_URL_TTL)
            .await?;
        certificate_views.push(CertificateView::new(&cert, link));
    }

    Ok(ResumeDocument::new(&user, &educations, content, certificate_views))
}

/// Returns a signed URL to the CV's PDF, compiling a fresh one when asked
/// to or when none exists yet.
pub async fn generate(
    state: &AppState,
    uid: &str,
    req: GenerateRequest,
) -> Result<String, AppError> {
    let cv = owned(state.cvs.as_ref(), uid, req.cv_id).await?;

    if let (false, Some(existing)) = (req.force_regenerate, cv.pdf_url.as_deref()) {
        return state
            .storage
            .signed_url(Bucket::Cvs, existing, DEFAULT_SIGNED_URL_TTL)
            .await;
    }

    let document = resume_document(
        state.users.as_ref(),
        state.education.as_ref(),
        state.certificates.as_ref(),
        state.storage.as_ref(),
        uid,
        &req.draft_content,
    )
    .await?;
    let latex = state.renderer.render_latex(&document, cv.template)?;
    let class_file = state.renderer.class_file(cv.template)?;
    let pdf = state.compiler.compile(&latex, class_file).await?;

    let path = object_path(uid, ".pdf");
    state
        .storage
        .upload(Bucket::Cvs, &path, pdf, "application/pdf")
        .await?;
    state.cvs.set_pdf_url(cv.id, &path).await?;
    if let Some(old) = cv.pdf_url.filter(|old| *old != path) {
        if let Err(e) = state.storage.remove(Bucket::Cvs, &old).await {
            warn!("Could not remove superseded PDF {old}: {e}");
        }
    }
    info!("Generated PDF for CV {} at {path}", cv.id);

    state
        .storage
        .signed_url(Bucket::Cvs, &path, DEFAULT_SIGNED_URL_TTL)
        .await
}

pub async fn render(state: &AppState, uid: &str, req: RenderRequest) -> Result<String, AppError> {
    let cv = owned(state.cvs.as_ref(), uid, req.cv_id).await?;
    let document = resume_document(
        state.users.as_ref(),
        state.education.as_ref(),
        state.certificates.as_ref(),
        state.storage.as_ref(),
        uid,
        &req.draft_content,
    )
    .await?;
    state.renderer.render_html(&document, cv.template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;
    use crate::testing::{MemoryCache, MemoryStore};

    async fn new_cv(store: &MemoryStore, uid: &str) -> i64 {
        create(
            store,
            uid,
            CreateCvRequest {
                cv_type: "academic".into(),
                template: 1,
            },
        )
        .await
        .unwrap()
    }

    fn save_req(cv_id: i64, content: DocumentContent) -> SaveRequest {
        SaveRequest {
            cv_id,
            pdf_url: None,
            content,
        }
    }

    #[tokio::test]
    async fn test_create_validates_type_and_template() {
        let store = MemoryStore::default();
        for (cv_type, template) in [("resume", 1), ("academic", 0), ("industry", 2)] {
            let err = create(
                &store,
                "u1",
                CreateCvRequest {
                    cv_type: cv_type.into(),
                    template,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let id = new_cv(&store, "u1").await;
        let listed = list(&store, "u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cv_id, id);
        assert_eq!(listed[0].version_number, 0);
        assert!(listed[0].title.starts_with("CV-"));
        assert_eq!(listed[0].title.len(), 11);
    }

    #[tokio::test]
    async fn test_versions_chain_through_parents() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;

        for _ in 0..3 {
            save(&store, &cache, "u1", save_req(cv_id, fixtures::content()))
                .await
                .unwrap();
        }

        let all = versions(&store, "u1", cv_id).await.unwrap();
        let numbers: Vec<i32> = all.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(all[0].parent_version_id, None);
        assert_eq!(all[1].parent_version_id, Some(all[0].id));
        assert_eq!(all[2].parent_version_id, Some(all[1].id));

        let detail = get(&store, &cache, "u1", cv_id).await.unwrap();
        assert_eq!(detail.cv.latest_saved_version_id, Some(all[2].id));
        assert_eq!(detail.cv.version_number, Some(3));
    }

    #[tokio::test]
    async fn test_autosave_then_save_clears_draft() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;
        let content = fixtures::content();

        autosave(
            &store,
            &cache,
            "u1",
            AutosaveRequest {
                cv_id,
                draft_content: content.clone(),
            },
        )
        .await
        .unwrap();

        let detail = get(&store, &cache, "u1", cv_id).await.unwrap();
        assert!(detail.has_unsaved_changes);
        assert!(detail.cv.is_draft);
        assert_eq!(detail.content, content);
        assert!(versions(&store, "u1", cv_id).await.unwrap().is_empty());

        let saved = save(&store, &cache, "u1", save_req(cv_id, content.clone()))
            .await
            .unwrap();
        assert!(!saved.is_draft);
        assert_eq!(saved.version_number, Some(1));

        let detail = get(&store, &cache, "u1", cv_id).await.unwrap();
        assert!(!detail.has_unsaved_changes);
        assert_eq!(detail.content.experiences[0].company, "Acme");
        assert!(detail.content.experiences[0].id.is_some());
    }

    #[tokio::test]
    async fn test_get_is_stable_without_writes() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;
        save(&store, &cache, "u1", save_req(cv_id, fixtures::content()))
            .await
            .unwrap();

        let first = get(&store, &cache, "u1", cv_id).await.unwrap();
        let second = get(&store, &cache, "u1", cv_id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_other_user_cannot_touch_cv() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;

        assert!(matches!(get(&store, &cache, "u2", cv_id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            update_meta(&store, "u2", cv_id, UpdateCvRequest::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            save(&store, &cache, "u2", save_req(cv_id, fixtures::content())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            autosave(
                &store,
                &cache,
                "u2",
                AutosaveRequest {
                    cv_id,
                    draft_content: DocumentContent::default()
                }
            )
            .await,
            Err(AppError::NotFound(_))
        ));
        let storage = crate::testing::MemoryStorage::default();
        assert!(matches!(
            delete(&store, &cache, &storage, "u2", cv_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(get(&store, &cache, "u1", cv_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_with_foreign_item_rolls_back() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let theirs = new_cv(&store, "u2").await;
        save(&store, &cache, "u2", save_req(theirs, fixtures::content()))
            .await
            .unwrap();
        let their_detail = get(&store, &cache, "u2", theirs).await.unwrap();
        let their_experience = their_detail.content.experiences[0].id.unwrap();

        let mine = new_cv(&store, "u1").await;
        let mut content = fixtures::content();
        content.experiences[0].id = Some(their_experience);
        let err = save(&store, &cache, "u1", save_req(mine, content))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(versions(&store, "u1", mine).await.unwrap().is_empty());
        let detail = get(&store, &cache, "u1", mine).await.unwrap();
        assert!(detail.cv.is_draft);
        assert!(detail.content.experiences.is_empty());
    }

    #[tokio::test]
    async fn test_linked_items_are_reused_not_duplicated() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;
        save(&store, &cache, "u1", save_req(cv_id, fixtures::content()))
            .await
            .unwrap();
        let saved = get(&store, &cache, "u1", cv_id).await.unwrap().content;
        let experience_id = saved.experiences[0].id;

        let mut next = saved.clone();
        next.experiences.push(fixtures::experience("Initech", "2023-01-01", None));
        save(&store, &cache, "u1", save_req(cv_id, next)).await.unwrap();

        let reloaded = get(&store, &cache, "u1", cv_id).await.unwrap().content;
        assert_eq!(reloaded.experiences.len(), 2);
        assert_eq!(reloaded.experiences[0].id, experience_id);
        assert_eq!(store.experience_count("u1"), 2);
    }

    #[tokio::test]
    async fn test_invalid_save_by_other_user_is_not_found() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;
        let mut content = fixtures::content();
        content.experiences[0].company = String::new();

        let err = save(&store, &cache, "u2", save_req(cv_id, content.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = save(&store, &cache, "u1", save_req(cv_id, content))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_repeated_item_is_saved_once() {
        let store = MemoryStore::default();
        let cache = MemoryCache::default();
        let cv_id = new_cv(&store, "u1").await;
        save(&store, &cache, "u1", save_req(cv_id, fixtures::content()))
            .await
            .unwrap();
        let mut content = get(&store, &cache, "u1", cv_id).await.unwrap().content;
        content.experiences.push(content.experiences[0].clone());

        save(&store, &cache, "u1", save_req(cv_id, content)).await.unwrap();

        let linked = get(&store, &cache, "u1", cv_id).await.unwrap().content;
        let history = versions(&store, "u1", cv_id).await.unwrap();
        assert_eq!(linked.experiences.len(), 1);
        assert_eq!(history[1].content.experiences, linked.experiences);
    }
}
