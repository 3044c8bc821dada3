//! Runtime configuration from environment variables.

use crate::assistant::DEFAULT_MODEL;
use crate::stats::PageGeometry;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_PATH: &str = ".manuscript_db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub db_path: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Recorded as the owner of projects created by this instance.
    pub author: Option<String>,
    pub page: PageGeometry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            author: None,
            page: PageGeometry::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset
    /// and unparsable numbers fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: f64| {
            get(key)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|n| n.is_finite() && *n >= 0.0)
                .unwrap_or(default)
        };
        let defaults = Self::default();

        Self {
            bind: get("MANUSCRIPT_BIND").unwrap_or(defaults.bind),
            db_path: get("MANUSCRIPT_DB").unwrap_or(defaults.db_path),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            author: get("MANUSCRIPT_AUTHOR"),
            page: PageGeometry {
                page_height: number("MANUSCRIPT_PAGE_HEIGHT", defaults.page.page_height),
                page_gap: number("MANUSCRIPT_PAGE_GAP", defaults.page.page_gap),
                lookahead: number("MANUSCRIPT_PAGE_LOOKAHEAD", defaults.page.lookahead),
            },
        }
    }
}
