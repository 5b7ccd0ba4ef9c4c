pub mod analyzer;
pub mod handlers;
pub mod quota;
pub mod service;

pub use quota::{AiUsageRepository, PgAiUsageRepository, QuotaKind};
