//! Data models for the manuscript application.
//!
//! This module contains the core data structures used throughout the application:
//! projects and their references, questionnaires, search candidates, and the
//! request bodies accepted by the HTTP API.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::sections::{SectionError, SectionStore};

/// Sections every freshly created project starts with.
pub const DEFAULT_SECTIONS: &[&str] = &[
    "Abstract",
    "Background",
    "Literature Review",
    "Methodology",
    "References",
];

/// Section that collects bibliography entries.
pub const REFERENCES_SECTION: &str = "References";

/// Short date format used for `updated_at` (e.g. "Oct 19, 2026").
pub const SHORT_DATE_FORMAT: &str = "%b %-d, %Y";

pub fn short_date_now() -> String {
    Local::now().format(SHORT_DATE_FORMAT).to_string()
}

// ============================================================================
// Citation Style & Methodology
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CitationStyle {
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    #[serde(rename = "IEEE")]
    Ieee,
    #[serde(rename = "Chicago")]
    Chicago,
}

impl CitationStyle {
    pub const ALL: [CitationStyle; 4] = [
        CitationStyle::Apa,
        CitationStyle::Mla,
        CitationStyle::Ieee,
        CitationStyle::Chicago,
    ];
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationStyle::Apa => write!(f, "APA"),
            CitationStyle::Mla => write!(f, "MLA"),
            CitationStyle::Ieee => write!(f, "IEEE"),
            CitationStyle::Chicago => write!(f, "Chicago"),
        }
    }
}

impl FromStr for CitationStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "ieee" => Ok(CitationStyle::Ieee),
            "chicago" => Ok(CitationStyle::Chicago),
            other => Err(format!("Unknown citation style: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Methodology {
    Qualitative,
    Quantitative,
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Methodology::Qualitative => write!(f, "Qualitative"),
            Methodology::Quantitative => write!(f, "Quantitative"),
        }
    }
}

// ============================================================================
// Papers & Sources
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    pub id: String,
    pub title: String,
    /// Ordered author list. A search candidate contributes its whole display
    /// string as a single entry.
    pub authors: Vec<String>,
    pub year: i32,
    pub journal: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// A candidate returned by the academic source search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundedSource {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub summary: String,
    pub uri: String,
}

// ============================================================================
// Questionnaires & Survey Responses
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    Text,
    Rating,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub project_id: String,
    pub answers: HashMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ProjectStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub theme: String,
    pub citation_style: CitationStyle,
    pub methodology: Methodology,
    pub sections: SectionStore,
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Insertion order is citation order.
    #[serde(default)]
    pub references: Vec<Paper>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub updated_at: String,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub source_file: Option<SourceFile>,
}

impl Project {
    pub fn new(
        title: &str,
        theme: &str,
        citation_style: CitationStyle,
        methodology: Methodology,
    ) -> Self {
        Self {
            id: crate::generate_id(),
            title: title.trim().to_string(),
            theme: theme.trim().to_string(),
            citation_style,
            methodology,
            sections: SectionStore::with_sections(DEFAULT_SECTIONS),
            questions: Vec::new(),
            references: Vec::new(),
            status: ProjectStatus::Draft,
            updated_at: short_date_now(),
            modified: Utc::now(),
            owner: None,
            source_file: None,
        }
    }

    /// Record a mutation.
    pub fn touch(&mut self) {
        self.updated_at = short_date_now();
        self.modified = Utc::now();
    }

    pub fn section(&self, name: &str) -> &str {
        self.sections.get(name)
    }

    pub fn set_section(&mut self, name: &str, html: &str) {
        self.sections.set(name, html);
        self.touch();
    }

    pub fn add_section(&mut self, name: &str) -> Result<(), SectionError> {
        self.sections.add_section(name)?;
        self.touch();
        Ok(())
    }

    pub fn remove_section(&mut self, name: &str) -> Result<String, SectionError> {
        let removed = self.sections.remove_section(name)?;
        self.touch();
        Ok(removed)
    }

    /// Append a paper to the reference list unless one with the same id is
    /// already present. Returns whether the list grew.
    pub fn add_reference(&mut self, paper: Paper) -> bool {
        if self.references.iter().any(|r| r.id == paper.id) {
            return false;
        }
        self.references.push(paper);
        self.touch();
        true
    }

    pub fn set_questions(&mut self, questions: Vec<Question>) {
        self.questions = questions;
        self.touch();
    }
}

/// Summary row for the project library listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub citation_style: CitationStyle,
    pub methodology: Methodology,
    pub status: ProjectStatus,
    pub updated_at: String,
    pub reference_count: usize,
}

impl From<&Project> for ProjectSummary {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.clone(),
            title: p.title.clone(),
            citation_style: p.citation_style,
            methodology: p.methodology,
            status: p.status,
            updated_at: p.updated_at.clone(),
            reference_count: p.references.len(),
        }
    }
}

// ============================================================================
// API Request Bodies
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub theme: String,
    pub citation_style: CitationStyle,
    pub methodology: Methodology,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionContentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddSectionRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThemeRequest {
    pub theme: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CiteRequest {
    pub source: GroundedSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub section: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionsRequest {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveySubmission {
    pub answers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_has_empty_default_sections() {
        let p = Project::new(
            "Remote Work and Mental Health",
            "remote work",
            CitationStyle::Apa,
            Methodology::Qualitative,
        );
        assert_eq!(p.citation_style, CitationStyle::Apa);
        assert_eq!(p.methodology, Methodology::Qualitative);
        assert_eq!(p.sections.len(), DEFAULT_SECTIONS.len());
        assert!(p.sections.iter().all(|(_, v)| v.is_empty()));
        assert!(p.references.is_empty());
        assert_eq!(p.status, ProjectStatus::Draft);
        assert_eq!(p.id.len(), 9);
    }

    #[test]
    fn test_add_reference_rejects_duplicate_id() {
        let mut p = Project::new("T", "", CitationStyle::Mla, Methodology::Quantitative);
        let paper = Paper {
            id: "abc".to_string(),
            title: "A".to_string(),
            authors: vec!["Doe, J.".to_string()],
            year: 2020,
            journal: "J".to_string(),
            abstract_text: String::new(),
            doi: None,
        };
        assert!(p.add_reference(paper.clone()));
        assert!(!p.add_reference(paper));
        assert_eq!(p.references.len(), 1);
    }

    #[test]
    fn test_citation_style_serde_names() {
        let json = serde_json::to_string(&CitationStyle::Chicago).unwrap();
        assert_eq!(json, "\"Chicago\"");
        let style: CitationStyle = serde_json::from_str("\"IEEE\"").unwrap();
        assert_eq!(style, CitationStyle::Ieee);
        assert_eq!("apa".parse::<CitationStyle>().unwrap(), CitationStyle::Apa);
        assert!("harvard".parse::<CitationStyle>().is_err());
    }

    #[test]
    fn test_question_type_kebab_case() {
        let q: Question = serde_json::from_str(
            r#"{"id":"q1","type":"multiple-choice","label":"Pick","options":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::MultipleChoice);
        assert_eq!(q.options.as_ref().map(|o| o.len()), Some(2));
    }

    #[test]
    fn test_section_mutation_updates_timestamp() {
        let mut p = Project::new("T", "", CitationStyle::Apa, Methodology::Qualitative);
        let before = p.modified;
        std::thread::sleep(std::time::Duration::from_millis(5));
        p.set_section("Abstract", "<p>Hi</p>");
        assert!(p.modified > before);
        assert_eq!(p.section("Abstract"), "<p>Hi</p>");
        assert_eq!(p.section("Nope"), "");
    }
}
