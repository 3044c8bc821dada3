//! Citation formatting: bibliography entries and in-text markers for the four
//! supported styles.
//!
//! Both formatters are pure functions of their inputs.

use crate::models::{CitationStyle, Paper};

#[cfg(test)]
#[path = "citations_test.rs"]
mod citations_test;

/// Used when the paper has no authors at all.
const NO_AUTHOR_SURNAME: &str = "Author";
/// Stands in for an empty first author before surname extraction.
const UNKNOWN_AUTHOR: &str = "Unknown";

// ============================================================================
// Bibliography Entries
// ============================================================================

/// Format a full bibliography entry for `paper` in `style`.
///
/// IEEE entries always carry the literal `[1]` label regardless of the
/// paper's position in the reference list; callers that need the running
/// number use [`format_in_text_citation`].
pub fn format_citation(paper: &Paper, style: CitationStyle) -> String {
    let authors = paper.authors.join(", ");
    match style {
        CitationStyle::Apa => format!(
            "{} ({}). {}. {}. DOI: {}",
            authors,
            paper.year,
            paper.title,
            paper.journal,
            paper.doi.as_deref().unwrap_or("")
        ),
        CitationStyle::Mla => format!(
            "{}. \"{}.\" {}, vol. 1, no. 1, {}.",
            authors, paper.title, paper.journal, paper.year
        ),
        CitationStyle::Ieee => format!(
            "[1] {}, \"{},\" {}, pp. 1-10, {}.",
            authors, paper.title, paper.journal, paper.year
        ),
        CitationStyle::Chicago => format!(
            "{}. \"{}.\" {} ({}).",
            authors, paper.title, paper.journal, paper.year
        ),
    }
}

// ============================================================================
// In-Text Citations
// ============================================================================

/// Surname of the first author.
///
/// "Zhang, L." -> "Zhang"; "Jane Doe" -> "Doe"; no authors -> "Author".
/// Without a comma the name is split on single spaces, so a trailing space
/// leaves an empty last token and falls back to "Author".
pub fn first_author_surname(paper: &Paper) -> String {
    let first = match paper.authors.first() {
        None => return NO_AUTHOR_SURNAME.to_string(),
        Some(a) if a.is_empty() => UNKNOWN_AUTHOR,
        Some(a) => a.as_str(),
    };

    let surname = match first.split_once(',') {
        Some((before, _)) => before.trim(),
        None => first.rsplit(' ').next().unwrap_or(""),
    };

    if surname.is_empty() {
        NO_AUTHOR_SURNAME.to_string()
    } else {
        surname.to_string()
    }
}

/// Format the inline marker for `paper`. `index` is the 1-based position in
/// the reference list and only affects IEEE.
pub fn format_in_text_citation(paper: &Paper, style: CitationStyle, index: usize) -> String {
    match style {
        CitationStyle::Ieee => format!("[{}]", index),
        CitationStyle::Apa => format!("({}, {})", first_author_surname(paper), paper.year),
        CitationStyle::Mla => format!("({})", first_author_surname(paper)),
        CitationStyle::Chicago => format!("({} {})", first_author_surname(paper), paper.year),
    }
}
