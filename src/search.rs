//! Source search panel and the "Cite" action.
//!
//! Searches may overlap. Each one gets a ticket with an increasing sequence
//! number and a completion is only shown when it is newer than whatever is
//! already on screen, so a slow early search cannot clobber a later one.

use chrono::{Datelike, Local};
use serde::Serialize;
use tracing::debug;

use crate::citations::{format_citation, format_in_text_citation};
use crate::editor::{Editor, RichText};
use crate::markup::escape_text;
use crate::models::{GroundedSource, Paper, Project, REFERENCES_SECTION};

/// Journal recorded for papers cited from a search candidate.
pub const SCHOLARLY_SOURCE: &str = "Scholarly Source";

// ============================================================================
// Search Panel
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub seq: u64,
    pub query: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SearchPanel {
    pub query: String,
    pub results: Vec<GroundedSource>,
    #[serde(skip)]
    issued: u64,
    #[serde(skip)]
    applied: u64,
}

impl SearchPanel {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Self::default()
        }
    }

    /// Start a search. A blank query is a no-op.
    pub fn begin(&mut self, query: &str) -> Option<SearchTicket> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.query = query.to_string();
        self.issued += 1;
        Some(SearchTicket {
            seq: self.issued,
            query: query.to_string(),
        })
    }

    /// Apply a finished search. Returns false for completions older than the
    /// results already displayed.
    pub fn complete(&mut self, ticket: &SearchTicket, results: Vec<GroundedSource>) -> bool {
        if ticket.seq <= self.applied {
            debug!(seq = ticket.seq, applied = self.applied, "Discarding stale search results");
            return false;
        }
        self.applied = ticket.seq;
        self.results = results;
        true
    }

    /// A search failed. Displayed results are left alone.
    pub fn fail(&mut self, ticket: &SearchTicket) {
        if ticket.seq > self.applied {
            self.applied = ticket.seq;
        }
    }

    pub fn is_searching(&self) -> bool {
        self.applied < self.issued
    }
}

#[derive(Debug, Serialize)]
pub struct SearchView<'a> {
    pub query: &'a str,
    pub results: &'a [GroundedSource],
    pub is_searching: bool,
}

impl SearchPanel {
    pub fn view(&self) -> SearchView<'_> {
        SearchView {
            query: &self.query,
            results: &self.results,
            is_searching: self.is_searching(),
        }
    }
}

// ============================================================================
// Cite
// ============================================================================

/// Leading-integer parse: optional sign then digits, anything after ignored.
fn parse_leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i32>().ok().map(|n| sign * n)
}

/// Publication year of a candidate, or the current year when the string has
/// no leading number or it is zero.
pub fn parse_year(year: &str) -> i32 {
    match parse_leading_int(year) {
        Some(y) if y != 0 => y,
        _ => Local::now().year(),
    }
}

pub fn paper_from_source(source: &GroundedSource) -> Paper {
    Paper {
        id: crate::generate_id(),
        title: source.title.clone(),
        authors: vec![source.authors.clone()],
        year: parse_year(&source.year),
        journal: SCHOLARLY_SOURCE.to_string(),
        abstract_text: source.summary.clone(),
        doi: None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CiteOutcome {
    pub paper: Paper,
    pub in_text: String,
    pub bibliography: String,
    /// Section that received the in-text marker.
    pub section: String,
}

/// Cite a search candidate into the project.
///
/// The in-text marker goes in at the editor caret. With no section open it is
/// appended to `active_section` instead. The bibliography entry is appended
/// to References as its own paragraph.
pub fn cite<R: RichText>(
    project: &mut Project,
    editor: &mut Editor<R>,
    active_section: &str,
    source: &GroundedSource,
) -> CiteOutcome {
    let paper = paper_from_source(source);
    let index = project.references.len() + 1;
    let in_text = format_in_text_citation(&paper, project.citation_style, index);
    let bibliography = format_citation(&paper, project.citation_style);

    let marker = escape_text(&in_text);
    let section = match editor.insert_at_caret(project, &format!(" {}", marker)) {
        Ok(()) => editor.section().unwrap_or(active_section).to_string(),
        Err(_) => {
            let existing = project.section(active_section).to_string();
            project.set_section(active_section, &format!("{} {}", existing, marker));
            active_section.to_string()
        }
    };

    // Ids are freshly generated, so this only guards against reuse.
    project.add_reference(paper.clone());

    let refs = project.section(REFERENCES_SECTION).to_string();
    project.set_section(
        REFERENCES_SECTION,
        &format!("{}<p>{}</p>", refs, escape_text(&bibliography)),
    );
    editor.refresh(project);

    debug!(paper = %paper.id, section = %section, "Cited source");
    CiteOutcome {
        paper,
        in_text,
        bibliography,
        section,
    }
}
