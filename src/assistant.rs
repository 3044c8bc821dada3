//! Research assistant backed by an external LLM.
//!
//! The `ResearchAssistant` trait is what the rest of the application talks to.
//! `GeminiAssistant` calls the Gemini `generateContent` endpoint; the
//! `OfflineAssistant` is used when no API key is configured.
//!
//! Network and API failures are errors. Output that cannot be parsed is not:
//! it is logged and an empty value is returned, so a bad completion never
//! breaks the editor.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::markup::render_generated;
use crate::models::{GroundedSource, Methodology, Question, QuestionType, DEFAULT_SECTIONS};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
/// Used when the search response carries no usable grounding URI.
pub const FALLBACK_SOURCE_URI: &str = "https://scholar.google.com";
/// Manuscript text sent for section extraction is cut to this many chars.
pub const EXTRACT_LIMIT: usize = 10_000;
pub const MAX_TOPICS: usize = 5;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("Assistant unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Trait
// ============================================================================

#[async_trait]
pub trait ResearchAssistant: Send + Sync {
    /// Up to five publication-ready titles for a theme.
    async fn suggest_topics(&self, theme: &str) -> Result<Vec<String>, AssistantError>;

    /// Split a raw manuscript into the default sections. Every default
    /// section is present in the result, possibly empty.
    async fn extract_sections(&self, raw: &str)
        -> Result<IndexMap<String, String>, AssistantError>;

    /// Draft one section as sanitized HTML.
    async fn generate_section(
        &self,
        topic: &str,
        methodology: Methodology,
        section: &str,
    ) -> Result<String, AssistantError>;

    async fn generate_questionnaire(
        &self,
        topic: &str,
        methodology: Methodology,
    ) -> Result<Vec<Question>, AssistantError>;

    async fn search_sources(&self, query: &str) -> Result<Vec<GroundedSource>, AssistantError>;

    /// A search query derived from a sample of section text. Empty means no
    /// suggestion.
    async fn suggest_query(&self, sample: &str) -> Result<String, AssistantError>;
}

// ============================================================================
// Gemini
// ============================================================================

pub struct GeminiAssistant {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiAssistant {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Call `generateContent` and return the raw response body.
    async fn generate(&self, body: Value) -> Result<Value, AssistantError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        if status >= 400 {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error")
                .to_string();
            warn!(status, %message, "Gemini request failed");
            return Err(AssistantError::Api { status, message });
        }
        Ok(body)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, AssistantError> {
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": prompt }] }] });
        Ok(response_text(&self.generate(body).await?))
    }

    async fn generate_json(&self, prompt: &str, schema: Value) -> Result<String, AssistantError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });
        Ok(response_text(&self.generate(body).await?))
    }
}

#[async_trait]
impl ResearchAssistant for GeminiAssistant {
    async fn suggest_topics(&self, theme: &str) -> Result<Vec<String>, AssistantError> {
        let prompt = format!(
            "Suggest 5 specific, high-level academic research titles based on this theme: \"{}\".\n\
             The titles must be professional, academic, and ready for publication.\n\
             Format the output as a simple JSON array of strings.",
            theme
        );
        let schema = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
        let text = self.generate_json(&prompt, schema).await?;
        Ok(parse_topics(&text))
    }

    async fn extract_sections(
        &self,
        raw: &str,
    ) -> Result<IndexMap<String, String>, AssistantError> {
        let excerpt: String = raw.chars().take(EXTRACT_LIMIT).collect();
        let prompt = format!(
            "I have a research manuscript with the following content: \"{}\".\n\
             Please extract and categorize the content into the following sections: {}.\n\
             Format the output as a JSON object where keys are the section names exactly.",
            excerpt,
            DEFAULT_SECTIONS.join(", ")
        );
        let properties: serde_json::Map<String, Value> = DEFAULT_SECTIONS
            .iter()
            .map(|name| (name.to_string(), json!({ "type": "STRING" })))
            .collect();
        let schema = json!({
            "type": "OBJECT",
            "properties": properties,
            "required": DEFAULT_SECTIONS,
        });
        let text = self.generate_json(&prompt, schema).await?;
        Ok(parse_sections(&text))
    }

    async fn generate_section(
        &self,
        topic: &str,
        methodology: Methodology,
        section: &str,
    ) -> Result<String, AssistantError> {
        let heading = if section == "Background" {
            "Background of the Study"
        } else {
            section
        };
        let prompt = format!(
            "Write a professional \"{}\" section for a research project titled \"{}\".\n\
             The methodology used is {}.\n\
             Write with academic depth, discussing general context, the problem, and current \
             trends in the field where relevant.\n\
             Keep it around 400 words. Do not use markdown headers, just paragraphs.",
            heading, topic, methodology
        );
        let text = self.generate_text(&prompt).await?;
        Ok(render_generated(&text))
    }

    async fn generate_questionnaire(
        &self,
        topic: &str,
        methodology: Methodology,
    ) -> Result<Vec<Question>, AssistantError> {
        let prompt = format!(
            "Design a survey questionnaire of 8 questions for a {} research project titled \"{}\".\n\
             Mix question types: \"multiple-choice\" (with 3-5 options), \"text\", and \
             \"rating\" (1 to 5).\n\
             Format the output as a JSON array of objects with fields id, type, label, options.",
            methodology, topic
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "STRING" },
                    "type": { "type": "STRING", "enum": ["multiple-choice", "text", "rating"] },
                    "label": { "type": "STRING" },
                    "options": { "type": "ARRAY", "items": { "type": "STRING" } }
                },
                "required": ["type", "label"]
            }
        });
        let text = self.generate_json(&prompt, schema).await?;
        Ok(parse_questions(&text))
    }

    async fn search_sources(&self, query: &str) -> Result<Vec<GroundedSource>, AssistantError> {
        let prompt = format!(
            "Search for real, recent academic papers, journals, and scholarly articles related \
             to the topic: \"{}\".\n\
             For each paper, provide: Title, Main Authors, Publication Year, and a 2-sentence \
             Summary.\n\
             Format your response as a JSON array of objects.\n\
             Example structure: [{{\"title\": \"...\", \"authors\": \"...\", \"year\": \"...\", \
             \"summary\": \"...\"}}]",
            query
        );
        // The search tool cannot be combined with a response schema.
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{ "google_search": {} }],
        });
        let response = self.generate(body).await?;
        let uris = grounding_uris(&response);
        debug!(chunks = uris.len(), "Grounded search returned");
        Ok(parse_sources(&response_text(&response), &uris))
    }

    async fn suggest_query(&self, sample: &str) -> Result<String, AssistantError> {
        let prompt = format!(
            "Read this excerpt from a research manuscript and propose one concise academic \
             search query (at most 8 words) that would find supporting sources.\n\
             Reply with the query only.\n\n{}",
            sample
        );
        let text = self.generate_text(&prompt).await?;
        Ok(clean_query(&text))
    }
}

// ============================================================================
// Offline
// ============================================================================

/// Stand-in used when no API key is configured. Every call reports the
/// assistant as unavailable.
#[derive(Debug, Default)]
pub struct OfflineAssistant;

impl OfflineAssistant {
    fn unavailable<T>() -> Result<T, AssistantError> {
        Err(AssistantError::Unavailable("GEMINI_API_KEY is not set".to_string()))
    }
}

#[async_trait]
impl ResearchAssistant for OfflineAssistant {
    async fn suggest_topics(&self, _theme: &str) -> Result<Vec<String>, AssistantError> {
        Self::unavailable()
    }

    async fn extract_sections(
        &self,
        _raw: &str,
    ) -> Result<IndexMap<String, String>, AssistantError> {
        Self::unavailable()
    }

    async fn generate_section(
        &self,
        _topic: &str,
        _methodology: Methodology,
        _section: &str,
    ) -> Result<String, AssistantError> {
        Self::unavailable()
    }

    async fn generate_questionnaire(
        &self,
        _topic: &str,
        _methodology: Methodology,
    ) -> Result<Vec<Question>, AssistantError> {
        Self::unavailable()
    }

    async fn search_sources(&self, _query: &str) -> Result<Vec<GroundedSource>, AssistantError> {
        Self::unavailable()
    }

    async fn suggest_query(&self, _sample: &str) -> Result<String, AssistantError> {
        Self::unavailable()
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Concatenated text parts of the first candidate.
pub fn response_text(response: &Value) -> String {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Slice from the first `open` to the last `close`, tolerating prose or code
/// fences around the JSON.
fn json_block(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_topics(text: &str) -> Vec<String> {
    let parsed = json_block(text, '[', ']')
        .and_then(|block| serde_json::from_str::<Vec<String>>(block).ok());
    match parsed {
        Some(topics) => topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TOPICS)
            .collect(),
        None => {
            warn!("Failed to parse topic suggestions");
            Vec::new()
        }
    }
}

pub fn parse_sections(text: &str) -> IndexMap<String, String> {
    let object = json_block(text, '{', '}')
        .and_then(|block| serde_json::from_str::<serde_json::Map<String, Value>>(block).ok());
    if object.is_none() {
        warn!("Failed to parse extracted manuscript sections");
    }
    DEFAULT_SECTIONS
        .iter()
        .map(|name| {
            let content = object
                .as_ref()
                .and_then(|o| o.get(*name))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            (name.to_string(), content)
        })
        .collect()
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    question_type: QuestionType,
    label: String,
    #[serde(default)]
    options: Option<Vec<String>>,
}

pub fn parse_questions(text: &str) -> Vec<Question> {
    let parsed = json_block(text, '[', ']')
        .and_then(|block| serde_json::from_str::<Vec<RawQuestion>>(block).ok());
    let Some(raw) = parsed else {
        warn!("Failed to parse generated questionnaire");
        return Vec::new();
    };
    raw.into_iter()
        .enumerate()
        .map(|(i, q)| Question {
            id: q
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("q{}", i + 1)),
            question_type: q.question_type,
            label: q.label,
            options: match q.question_type {
                QuestionType::MultipleChoice => q.options,
                _ => None,
            },
        })
        .collect()
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    summary: String,
}

fn year_string(year: &Value) -> String {
    match year {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse search candidates, attaching grounding URIs by position.
pub fn parse_sources(text: &str, uris: &[Option<String>]) -> Vec<GroundedSource> {
    let parsed = json_block(text, '[', ']')
        .and_then(|block| serde_json::from_str::<Vec<RawSource>>(block).ok());
    let Some(raw) = parsed else {
        warn!("Failed to parse grounded sources");
        return Vec::new();
    };
    raw.into_iter()
        .enumerate()
        .map(|(i, s)| GroundedSource {
            title: s.title,
            authors: s.authors,
            year: year_string(&s.year),
            summary: s.summary,
            uri: pick_uri(uris, i),
        })
        .collect()
}

/// Web URIs of the grounding chunks, in order. Chunks without a usable URI
/// keep their position as `None`.
pub fn grounding_uris(response: &Value) -> Vec<Option<String>> {
    response["candidates"][0]["groundingMetadata"]["groundingChunks"]
        .as_array()
        .map(|chunks| {
            chunks
                .iter()
                .map(|c| {
                    c["web"]["uri"]
                        .as_str()
                        .and_then(|u| validate_source_uri(u).ok())
                        .map(|u| u.to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The chunk at `index`, else the first chunk, else the fallback.
pub fn pick_uri(uris: &[Option<String>], index: usize) -> String {
    uris.get(index)
        .cloned()
        .flatten()
        .or_else(|| uris.first().cloned().flatten())
        .unwrap_or_else(|| FALLBACK_SOURCE_URI.to_string())
}

fn clean_query(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

// ============================================================================
// Source URI Validation
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UriError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Only HTTP(S) URLs are allowed")]
    UnsupportedScheme,
    #[error("Internal addresses are not allowed: {0}")]
    InternalAddress(String),
}

fn is_internal_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        // Shared address space (100.64.0.0/10)
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xC0) == 64)
}

fn is_internal_ipv6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.to_ipv4_mapped().is_some_and(|v4| is_internal_ipv4(&v4))
        // Unique local (fc00::/7)
        || (ip.segments()[0] & 0xFE00) == 0xFC00
        // Link-local (fe80::/10)
        || (ip.segments()[0] & 0xFFC0) == 0xFE80
}

/// Check a grounding URI before it is shown as a link: it must parse, be
/// http(s), and not point at a literal internal address.
pub fn validate_source_uri(uri: &str) -> Result<Url, UriError> {
    let url = Url::parse(uri).map_err(|e| UriError::InvalidUrl(e.to_string()))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(UriError::UnsupportedScheme);
    }
    match url.host() {
        None => return Err(UriError::InvalidUrl("No host in URL".to_string())),
        Some(Host::Ipv4(ip)) if is_internal_ipv4(&ip) => {
            return Err(UriError::InternalAddress(ip.to_string()))
        }
        Some(Host::Ipv6(ip)) if is_internal_ipv6(&ip) => {
            return Err(UriError::InternalAddress(ip.to_string()))
        }
        Some(Host::Domain(d)) if d.eq_ignore_ascii_case("localhost") => {
            return Err(UriError::InternalAddress(d.to_string()))
        }
        Some(_) => {}
    }
    Ok(url)
}
