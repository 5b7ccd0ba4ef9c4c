use std::sync::Arc;

use crate::ai::AiUsageRepository;
use crate::cache::DraftCache;
use crate::certificate::CertificateRepository;
use crate::config::Config;
use crate::cv::CvRepository;
use crate::education::EducationRepository;
use crate::identity::TokenVerifier;
use crate::llm_client::ChatModel;
use crate::portfolio::PortfolioRepository;
use crate::render::{DocumentRenderer, LatexCompiler};
use crate::storage::ObjectStorage;
use crate::users::UserRepository;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external dependency sits behind a trait object so the router can be
/// assembled against in-memory doubles in tests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserRepository>,
    pub education: Arc<dyn EducationRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub cvs: Arc<dyn CvRepository>,
    pub portfolios: Arc<dyn PortfolioRepository>,
    pub usage: Arc<dyn AiUsageRepository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub drafts: Arc<dyn DraftCache>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Groq, for résumé text optimization.
    pub optimizer: Arc<dyn ChatModel>,
    /// Gemini, for résumé file analysis.
    pub analyzer: Arc<dyn ChatModel>,
    pub compiler: Arc<dyn LatexCompiler>,
    pub renderer: Arc<DocumentRenderer>,
}
