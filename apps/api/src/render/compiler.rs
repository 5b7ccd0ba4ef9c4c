use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{error, info};

use crate::errors::AppError;

/// Turns a LaTeX document plus its class file into PDF bytes.
#[async_trait]
pub trait LatexCompiler: Send + Sync {
    async fn compile(&self, latex: &str, class_file: &str) -> Result<Bytes, AppError>;
}

#[derive(Serialize)]
struct CompileRequest<'a> {
    compiler: &'a str,
    resources: [Resource<'a>; 2],
}

#[derive(Serialize)]
struct Resource<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    main: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    content: &'a str,
}

/// LaTeX-on-HTTP compile service (synchronous builds endpoint).
pub struct RemoteLatexCompiler {
    client: Client,
    url: String,
}

impl RemoteLatexCompiler {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl LatexCompiler for RemoteLatexCompiler {
    async fn compile(&self, latex: &str, class_file: &str) -> Result<Bytes, AppError> {
        let body = CompileRequest {
            compiler: "pdflatex",
            resources: [
                Resource {
                    main: Some(true),
                    path: None,
                    content: latex,
                },
                Resource {
                    main: None,
                    path: Some("resume.cls"),
                    content: class_file,
                },
            ],
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("LaTeX compiler unreachable: {e}")))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let log = response.text().await.unwrap_or_default();
            error!("LaTeX compilation failed with {status}: {log}");
            return Err(AppError::Upstream(format!("LaTeX API error: {status}")));
        }

        let pdf = response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("LaTeX compiler response: {e}")))?;
        info!("Compiled résumé PDF ({} bytes)", pdf.len());
        Ok(pdf)
    }
}
