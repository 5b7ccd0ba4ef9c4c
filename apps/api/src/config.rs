use anyhow::{Context, Result};

pub const DEFAULT_LATEX_COMPILER_URL: &str = "https://latex.ytotech.com/builds/sync";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub database_url: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub buckets: BucketNames,
    pub groq_api_key: String,
    pub google_api_key: String,
    pub firebase_project_id: String,
    pub latex_compiler_url: String,
    pub max_body_bytes: usize,
    pub rust_log: String,
}

/// Physical bucket names behind each logical storage bucket.
#[derive(Debug, Clone)]
pub struct BucketNames {
    pub certificates: String,
    pub cvs: String,
    pub portfolio_images: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port: parse_env("PORT", 8000)?,
            frontend_url: require_env("FRONTEND_URL")?,
            database_url: require_env("DATABASE_URL")?,
            redis_host: env_or("REDIS_HOST", "127.0.0.1"),
            redis_port: parse_env("REDIS_PORT", 6379)?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: env_or("S3_REGION", "us-east-1"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            buckets: BucketNames {
                certificates: env_or("CERTIFICATES_BUCKET", "certificates"),
                cvs: env_or("CVS_BUCKET", "cvs"),
                portfolio_images: env_or("PORTFOLIO_IMAGES_BUCKET", "portfolio-images"),
            },
            groq_api_key: require_env("GROQ_API_KEY")?,
            google_api_key: require_env("GOOGLE_API_KEY")?,
            firebase_project_id: require_env("FIREBASE_PROJECT_ID")?,
            latex_compiler_url: env_or("LATEX_COMPILER_URL", DEFAULT_LATEX_COMPILER_URL),
            max_body_bytes: parse_env("MAX_BODY_BYTES", 20 * 1024 * 1024)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}
