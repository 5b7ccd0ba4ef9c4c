//! LLM client. Every call to a hosted language model goes through this module.
//!
//! Two providers are wired: Groq (OpenAI-compatible chat completions) for
//! résumé text optimization and Gemini for résumé file analysis. Each call is
//! a single attempt; a failed or non-2xx response is returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

pub mod gemini;
pub mod groq;
pub mod prompts;

pub use gemini::GeminiClient;
pub use groq::GroqClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A single-turn chat model: one system instruction, one user message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(REQUEST_TIMEOUT).build()
}

/// Sends `request` once. Non-2xx responses become errors carrying the body.
pub(crate) async fn send(provider: &str, request: RequestBuilder) -> Result<Response, LlmError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("{provider} API returned {status}: {body}");
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(body)
    } else {
        LlmError::Api {
            status: status.as_u16(),
            message: body,
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Finds the outermost `{ ... }` span in free-form model output and parses it.
/// Returns `None` when there is no span or it is not a JSON object.
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let re = Regex::new(r"(?s)\{.*\}").ok()?;
    let candidate = re.find(strip_json_fences(text))?.as_str();
    match serde_json::from_str::<serde_json::Value>(candidate).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
