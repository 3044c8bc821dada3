//! Turning an uploaded manuscript into a new project.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::info;

use crate::assistant::{AssistantError, ResearchAssistant, EXTRACT_LIMIT};
use crate::markup::{paragraphs_to_html, render_generated};
use crate::models::{CitationStyle, Methodology, Project, SourceFile};

pub const IMPORT_THEME: &str = "Uploaded manuscript";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No file uploaded")]
    Empty,
    #[error("Could not read PDF: {0}")]
    Pdf(String),
    #[error("The uploaded file contains no text")]
    NoText,
    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("application/pdf")
            || self.file_name.to_lowercase().ends_with(".pdf")
            || self.bytes.starts_with(b"%PDF")
    }
}

/// File name without its last extension.
pub fn title_from_filename(name: &str) -> String {
    let name = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

/// Plain text of the upload. PDFs are parsed; anything else is read as
/// UTF-8 with invalid bytes replaced.
pub fn extract_text(upload: &Upload) -> Result<String, ImportError> {
    if upload.bytes.is_empty() {
        return Err(ImportError::Empty);
    }
    let text = if upload.is_pdf() {
        pdf_extract::extract_text_from_mem(&upload.bytes)
            .map_err(|e| ImportError::Pdf(e.to_string()))?
    } else {
        String::from_utf8_lossy(&upload.bytes).into_owned()
    };
    if text.trim().is_empty() {
        return Err(ImportError::NoText);
    }
    Ok(text)
}

fn section_html(content: &str) -> String {
    if content.trim_start().starts_with('<') {
        render_generated(content)
    } else {
        paragraphs_to_html(content)
    }
}

/// Build the project for an upload from the extracted sections.
pub fn build_project(upload: &Upload, sections: &IndexMap<String, String>) -> Project {
    let mut project = Project::new(
        &title_from_filename(&upload.file_name),
        IMPORT_THEME,
        CitationStyle::Apa,
        Methodology::Qualitative,
    );
    for (name, content) in sections {
        project.set_section(name, &section_html(content));
    }
    project.source_file = Some(SourceFile {
        name: upload.file_name.clone(),
        content_type: upload.content_type.clone(),
    });
    project
}

/// Extract, categorize and build. Only the first part of the text is sent to
/// the assistant.
pub async fn import_manuscript(
    upload: &Upload,
    text: &str,
    assistant: &dyn ResearchAssistant,
) -> Result<Project, ImportError> {
    let excerpt: String = text.chars().take(EXTRACT_LIMIT).collect();
    let sections = assistant.extract_sections(&excerpt).await?;
    let project = build_project(upload, &sections);
    info!(id = %project.id, file = %upload.file_name, "Imported manuscript");
    Ok(project)
}
