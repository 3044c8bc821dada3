//! Ordered section store: section name -> HTML content.
//!
//! Keys keep insertion order so navigation lists render in a stable order,
//! and every key the navigation shows is a key of the store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SectionError {
    #[error("A section named \"{0}\" already exists")]
    Duplicate(String),
    #[error("Section name cannot be empty")]
    EmptyName,
    #[error("Section not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionStore {
    entries: IndexMap<String, String>,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|n| (n.to_string(), String::new()))
            .collect();
        Self { entries }
    }

    /// Content of a section; absent keys read as empty.
    pub fn get(&self, name: &str) -> &str {
        self.entries.get(name).map(String::as_str).unwrap_or("")
    }

    /// Replace the full content of a section, creating it if needed.
    pub fn set(&mut self, name: &str, html: &str) {
        match self.entries.get_mut(name) {
            Some(existing) => {
                existing.clear();
                existing.push_str(html);
            }
            None => {
                self.entries.insert(name.to_string(), html.to_string());
            }
        }
    }

    /// Create an empty section. Duplicate names are rejected.
    pub fn add_section(&mut self, name: &str) -> Result<(), SectionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SectionError::EmptyName);
        }
        if self.entries.contains_key(name) {
            return Err(SectionError::Duplicate(name.to_string()));
        }
        self.entries.insert(name.to_string(), String::new());
        Ok(())
    }

    /// Remove a section, returning its content. Remaining keys keep their order.
    pub fn remove_section(&mut self, name: &str) -> Result<String, SectionError> {
        self.entries
            .shift_remove(name)
            .ok_or_else(|| SectionError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for SectionStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
