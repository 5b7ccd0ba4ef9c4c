mod ai;
mod auth;
mod cache;
mod catalog;
mod certificate;
mod config;
mod cv;
mod db;
mod education;
mod errors;
mod forms;
mod identity;
mod job;
mod llm_client;
mod models;
mod portfolio;
mod render;
mod routes;
mod state;
mod storage;
mod users;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::PgAiUsageRepository;
use crate::cache::RedisDraftCache;
use crate::certificate::PgCertificateRepository;
use crate::config::Config;
use crate::cv::PgCvRepository;
use crate::db::create_pool;
use crate::education::PgEducationRepository;
use crate::identity::FirebaseTokenVerifier;
use crate::llm_client::{GeminiClient, GroqClient};
use crate::portfolio::PgPortfolioRepository;
use crate::render::{DocumentRenderer, RemoteLatexCompiler};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3ObjectStorage;
use crate::users::PgUserRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Career Studio API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url())?;
    let redis = redis::aio::ConnectionManager::new(redis)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection established");

    // Initialize S3-compatible object storage
    let s3 = build_s3_client(&config).await;
    info!("Object storage client initialized");

    let http = llm_client::http_client()?;
    let renderer = DocumentRenderer::new().context("Failed to compile résumé templates")?;

    let state = AppState {
        config: config.clone(),
        users: Arc::new(PgUserRepository::new(db.clone())),
        education: Arc::new(PgEducationRepository::new(db.clone())),
        certificates: Arc::new(PgCertificateRepository::new(db.clone())),
        cvs: Arc::new(PgCvRepository::new(db.clone())),
        portfolios: Arc::new(PgPortfolioRepository::new(db.clone())),
        usage: Arc::new(PgAiUsageRepository::new(db.clone())),
        storage: Arc::new(S3ObjectStorage::new(s3, config.buckets.clone())),
        drafts: Arc::new(RedisDraftCache::new(redis)),
        verifier: Arc::new(FirebaseTokenVerifier::new(
            http.clone(),
            config.firebase_project_id.clone(),
        )),
        optimizer: Arc::new(GroqClient::new(http.clone(), config.groq_api_key.clone())),
        analyzer: Arc::new(GeminiClient::new(http.clone(), config.google_api_key.clone())),
        compiler: Arc::new(RemoteLatexCompiler::new(
            http,
            config.latex_compiler_url.clone(),
        )),
        renderer: Arc::new(renderer),
    };
    info!(
        "LLM clients initialized (optimizer: {}, analyzer: {})",
        llm_client::groq::MODEL,
        llm_client::gemini::MODEL
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

/// Constructs an S3 client for the configured S3-compatible endpoint.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "career-studio-static",
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
