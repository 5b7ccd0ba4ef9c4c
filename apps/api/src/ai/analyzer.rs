//! Résumé text extraction and scoring.

use std::io::{Cursor, Read};

use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::forms::UploadedFile;
use crate::llm_client::prompts::{resume_analysis_prompt, RESUME_ANALYSIS_SYSTEM};
use crate::llm_client::{extract_json_object, ChatModel};

pub const MAX_RESUME_BYTES: usize = 8 * 1024 * 1024;

const ATS_SECTIONS: &[&str] = &["experience", "education", "skills", "project", "certification"];

const JOB_KEYWORDS: &[&str] = &[
    "python",
    "java",
    "sql",
    "leadership",
    "communication",
    "team",
    "analysis",
    "management",
    "cloud",
    "aws",
    "azure",
    "react",
    "node",
    "machine learning",
];

const DOCX_CONTENT_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Docx,
}

impl ResumeFormat {
    /// PDF wins when both could apply; generic binary uploads are read as PDF.
    pub fn detect(file: &UploadedFile) -> Result<Self, AppError> {
        let content_type = file.content_type.as_deref().unwrap_or_default();
        let ext = file.extension();
        if matches!(content_type, "application/pdf" | "application/octet-stream")
            || ext.as_deref() == Some(".pdf")
        {
            Ok(ResumeFormat::Pdf)
        } else if DOCX_CONTENT_TYPES.contains(&content_type) || ext.as_deref() == Some(".docx") {
            Ok(ResumeFormat::Docx)
        } else {
            Err(AppError::Validation(
                "Unsupported file type. Please upload PDF or DOCX.".into(),
            ))
        }
    }
}

/// Extracts plain text on a blocking thread. Any failure, including a panic
/// inside the PDF parser, yields an empty string.
pub async fn extract_text(format: ResumeFormat, bytes: Bytes) -> String {
    let task = tokio::task::spawn_blocking(move || match format {
        ResumeFormat::Pdf => extract_pdf(&bytes),
        ResumeFormat::Docx => extract_docx(&bytes),
    });
    match task.await {
        Ok(text) => text,
        Err(e) => {
            warn!("Résumé text extraction aborted: {e}");
            String::new()
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("Error extracting text from PDF: {e}");
            String::new()
        }
    }
}

fn extract_docx(bytes: &[u8]) -> String {
    match docx_document_xml(bytes) {
        Ok(xml) => docx_paragraphs(&xml).join("\n").trim().to_string(),
        Err(e) => {
            warn!("Error extracting text from DOCX: {e}");
            String::new()
        }
    }
}

fn docx_document_xml(bytes: &[u8]) -> Result<String, zip::result::ZipError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name("word/document.xml")?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Text runs of each `<w:p>` paragraph, in document order.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    let Ok(run) = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>") else {
        return Vec::new();
    };
    xml.split("</w:p>")
        .filter(|chunk| chunk.contains("<w:p"))
        .map(|paragraph| {
            run.captures_iter(paragraph)
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .collect::<String>()
        })
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// 20 points per standard section keyword, 10 more when the text mentions
/// neither tables nor images.
pub fn ats_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let mut score = ATS_SECTIONS.iter().filter(|kw| lower.contains(*kw)).count() as i32 * 20;
    if !lower.contains("table") && !lower.contains("image") {
        score += 10;
    }
    score.min(100)
}

pub fn keyword_match_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let found = JOB_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    ((found * 100 / JOB_KEYWORDS.len()) as i32).min(100)
}

pub fn formatting_score(text: &str) -> i32 {
    let lower = text.to_lowercase();
    let mut score = 0;
    if text.contains(['-', '*', '•']) {
        score += 30;
    }
    if lower.contains("education") && lower.contains("experience") {
        score += 30;
    }
    if (20..=100).contains(&text.lines().count()) {
        score += 40;
    }
    score.min(100)
}

/// Keys the model is asked to produce. Missing keys stay `None`.
#[derive(Debug, Default, Deserialize)]
struct ModelAnalysis {
    overall_assessment: Option<String>,
    skills: Option<Vec<String>>,
    missing_skills: Option<Vec<String>>,
    experience_summary: Option<String>,
    education_summary: Option<String>,
    strengths: Option<Vec<String>>,
    weaknesses: Option<Vec<String>>,
    recommendations: Option<Vec<String>>,
    resume_score: Option<i64>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ResumeAnalysis {
    pub overall_assessment: Option<String>,
    pub skills: Option<Vec<String>>,
    pub missing_skills: Option<Vec<String>>,
    pub experience_summary: Option<String>,
    pub education_summary: Option<String>,
    pub strengths: Option<Vec<String>>,
    pub weaknesses: Option<Vec<String>>,
    pub recommended_courses: Option<Vec<String>>,
    pub resume_score: Option<i64>,
    /// Raw model output when it could not be read as JSON.
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ats_score: i32,
    pub keyword_match_score: i32,
    pub formatting_score: i32,
}

impl ResumeAnalysis {
    fn from_model_output(raw: &str) -> Self {
        let parsed = extract_json_object(raw).and_then(|map| {
            serde_json::from_value::<ModelAnalysis>(serde_json::Value::Object(map)).ok()
        });
        match parsed {
            Some(m) => Self {
                overall_assessment: m.overall_assessment,
                skills: m.skills,
                missing_skills: m.missing_skills,
                experience_summary: m.experience_summary,
                education_summary: m.education_summary,
                strengths: m.strengths,
                weaknesses: m.weaknesses,
                recommended_courses: m.recommendations,
                resume_score: m.resume_score,
                ..Default::default()
            },
            None => Self {
                analysis: Some(raw.to_string()),
                ..Default::default()
            },
        }
    }
}

/// Scores `text` and asks `model` for a qualitative review. Model failures
/// are reported in `error`; the heuristic scores are always present.
pub async fn analyze(model: &dyn ChatModel, text: &str) -> ResumeAnalysis {
    let mut result = if text.trim().is_empty() {
        ResumeAnalysis {
            error: Some("No text could be extracted from the resume.".into()),
            ..Default::default()
        }
    } else {
        match model
            .complete(RESUME_ANALYSIS_SYSTEM, &resume_analysis_prompt(text))
            .await
        {
            Ok(raw) => ResumeAnalysis::from_model_output(&raw),
            Err(e) => {
                warn!("Résumé analysis failed: {e}");
                ResumeAnalysis {
                    error: Some(format!("Analysis failed: {e}")),
                    ..Default::default()
                }
            }
        }
    };

    result.ats_score = ats_score(text);
    result.keyword_match_score = keyword_match_score(text);
    result.formatting_score = formatting_score(text);
    result
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::testing::FakeLlm;

    fn upload(name: &str, content_type: Option<&str>) -> UploadedFile {
        UploadedFile {
            filename: name.into(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(b"%PDF"),
        }
    }

    fn docx_bytes(document_xml: &str) -> Bytes {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/document.xml", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        Bytes::from(buffer.into_inner())
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ResumeFormat::detect(&upload("cv.bin", Some("application/octet-stream"))).unwrap(),
            ResumeFormat::Pdf
        );
        assert_eq!(ResumeFormat::detect(&upload("CV.PDF", None)).unwrap(), ResumeFormat::Pdf);
        assert_eq!(
            ResumeFormat::detect(&upload("cv.docx", Some("text/plain"))).unwrap(),
            ResumeFormat::Docx
        );
        assert!(matches!(
            ResumeFormat::detect(&upload("cv.txt", Some("text/plain"))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_ats_score() {
        let text = "Experience\nEducation\nSkills\nProjects\nCertifications";
        assert_eq!(ats_score(text), 100);
        assert_eq!(ats_score("Experience with a table layout"), 20);
        assert_eq!(ats_score("nothing relevant"), 10);
    }

    #[test]
    fn test_keyword_match_score() {
        assert_eq!(keyword_match_score(""), 0);
        // javascript and postgresql also match java and sql
        assert_eq!(keyword_match_score("Python, JavaScript, PostgreSQL"), 21);
        assert_eq!(keyword_match_score(&JOB_KEYWORDS.join(" ")), 100);
    }

    #[test]
    fn test_formatting_score() {
        let mut text = String::from("Education\nExperience\n");
        for i in 0..20 {
            text.push_str(&format!("• item {i}\n"));
        }
        assert_eq!(formatting_score(&text), 100);
        assert_eq!(formatting_score("plain words"), 0);
        assert_eq!(formatting_score("- one bullet"), 30);
    }

    #[tokio::test]
    async fn test_docx_paragraphs_are_extracted() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Jane</w:t></w:r><w:r><w:t xml:space="preserve"> Doe</w:t></w:r></w:p>
            <w:p><w:r><w:t>R&amp;D Engineer</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = extract_text(ResumeFormat::Docx, docx_bytes(xml)).await;
        assert_eq!(text, "Jane Doe\nR&D Engineer");
    }

    #[tokio::test]
    async fn test_unreadable_files_yield_empty_text() {
        let junk = Bytes::from_static(b"definitely not a document");
        assert_eq!(extract_text(ResumeFormat::Docx, junk.clone()).await, "");
        assert_eq!(extract_text(ResumeFormat::Pdf, junk).await, "");
    }

    #[tokio::test]
    async fn test_model_json_is_mapped() {
        let model = FakeLlm::replying(
            "Sure!\n```json\n{\"overall_assessment\": \"Solid\", \"skills\": [\"Rust\"], \"recommendations\": [\"Kubernetes\"], \"resume_score\": 78}\n```",
        );
        let result = analyze(&model, "Experience\nEducation").await;
        assert_eq!(result.overall_assessment.as_deref(), Some("Solid"));
        assert_eq!(result.skills, Some(vec!["Rust".to_string()]));
        assert_eq!(result.recommended_courses, Some(vec!["Kubernetes".to_string()]));
        assert_eq!(result.resume_score, Some(78));
        assert_eq!(result.analysis, None);
        assert_eq!(result.ats_score, 50);
    }

    #[tokio::test]
    async fn test_non_json_reply_is_kept_raw() {
        let model = FakeLlm::replying("Looks fine overall.");
        let result = analyze(&model, "some resume").await;
        assert_eq!(result.analysis.as_deref(), Some("Looks fine overall."));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_model_failure_keeps_scores() {
        let model = FakeLlm::failing();
        let result = analyze(&model, "Experience and Education").await;
        assert!(result.error.unwrap().starts_with("Analysis failed"));
        assert_eq!(result.ats_score, 50);

        let untouched = FakeLlm::replying("{}");
        let empty = analyze(&untouched, "   ").await;
        assert!(empty.error.is_some());
        assert_eq!(untouched.calls(), 0);
    }
}
