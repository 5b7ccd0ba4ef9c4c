//! Buffered `multipart/form-data` parsing shared by the upload endpoints.

use std::collections::HashMap;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Lower-cased extension including the dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// All fields of one form; a part with a filename is treated as a file.
#[derive(Debug, Default)]
pub struct FormFields {
    texts: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormFields {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormFields::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.texts.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Text value, with blank values treated as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.filename.is_empty())
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.get(name).is_some_and(|f| !f.filename.is_empty())
    }

    #[cfg(test)]
    pub fn from_parts(texts: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: files
                .into_iter()
                .map(|(k, f)| (k.to_string(), f))
                .collect(),
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body is too large".into())
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}
