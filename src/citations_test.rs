//! Tests for bibliography and in-text citation formatting.

use super::*;
use crate::models::{CitationStyle, Paper};

// ============================================================================
// Helpers
// ============================================================================

fn mock_paper(authors: &[&str], doi: Option<&str>) -> Paper {
    Paper {
        id: "1".to_string(),
        title: "The Impact of Artificial Intelligence on Higher Education".to_string(),
        authors: authors.iter().map(|a| a.to_string()).collect(),
        year: 2023,
        journal: "Journal of Educational Technology".to_string(),
        abstract_text: "AI in university settings.".to_string(),
        doi: doi.map(|d| d.to_string()),
    }
}

fn zhang_miller() -> Paper {
    mock_paper(&["Zhang, L.", "Miller, K."], Some("10.1016/jet.2023.04.001"))
}

// ============================================================================
// Bibliography Templates
// ============================================================================

#[test]
fn test_format_citation_apa() {
    assert_eq!(
        format_citation(&zhang_miller(), CitationStyle::Apa),
        "Zhang, L., Miller, K. (2023). The Impact of Artificial Intelligence on Higher Education. \
         Journal of Educational Technology. DOI: 10.1016/jet.2023.04.001"
    );
}

#[test]
fn test_format_citation_apa_without_doi() {
    let paper = mock_paper(&["Jane Doe"], None);
    assert_eq!(
        format_citation(&paper, CitationStyle::Apa),
        "Jane Doe (2023). The Impact of Artificial Intelligence on Higher Education. \
         Journal of Educational Technology. DOI: "
    );
}

#[test]
fn test_format_citation_mla() {
    assert_eq!(
        format_citation(&zhang_miller(), CitationStyle::Mla),
        "Zhang, L., Miller, K.. \"The Impact of Artificial Intelligence on Higher Education.\" \
         Journal of Educational Technology, vol. 1, no. 1, 2023."
    );
}

#[test]
fn test_format_citation_ieee_always_labels_one() {
    assert_eq!(
        format_citation(&zhang_miller(), CitationStyle::Ieee),
        "[1] Zhang, L., Miller, K., \"The Impact of Artificial Intelligence on Higher Education,\" \
         Journal of Educational Technology, pp. 1-10, 2023."
    );
    let other = mock_paper(&["Jane Doe"], None);
    assert!(format_citation(&other, CitationStyle::Ieee).starts_with("[1] "));
}

#[test]
fn test_format_citation_chicago() {
    assert_eq!(
        format_citation(&zhang_miller(), CitationStyle::Chicago),
        "Zhang, L., Miller, K.. \"The Impact of Artificial Intelligence on Higher Education.\" \
         Journal of Educational Technology (2023)."
    );
}

#[test]
fn test_format_citation_is_deterministic() {
    let paper = zhang_miller();
    for style in CitationStyle::ALL {
        assert_eq!(format_citation(&paper, style), format_citation(&paper, style));
        assert_eq!(
            format_in_text_citation(&paper, style, 4),
            format_in_text_citation(&paper, style, 4)
        );
    }
}

// ============================================================================
// Surname Extraction
// ============================================================================

#[test]
fn test_surname_comma_form() {
    assert_eq!(first_author_surname(&mock_paper(&["Zhang, L."], None)), "Zhang");
}

#[test]
fn test_surname_space_form() {
    assert_eq!(first_author_surname(&mock_paper(&["Jane Doe"], None)), "Doe");
}

#[test]
fn test_surname_no_authors() {
    assert_eq!(first_author_surname(&mock_paper(&[], None)), "Author");
}

#[test]
fn test_surname_empty_first_author() {
    assert_eq!(first_author_surname(&mock_paper(&[""], None)), "Unknown");
}

#[test]
fn test_surname_trailing_space_falls_back() {
    assert_eq!(first_author_surname(&mock_paper(&["Jane Doe "], None)), "Author");
    assert_eq!(first_author_surname(&mock_paper(&["   "], None)), "Author");
}

#[test]
fn test_surname_double_space_keeps_last_token() {
    assert_eq!(first_author_surname(&mock_paper(&["Jane  Doe"], None)), "Doe");
}

#[test]
fn test_surname_single_token() {
    assert_eq!(first_author_surname(&mock_paper(&["Plato"], None)), "Plato");
}

#[test]
fn test_surname_uses_first_comma_only() {
    assert_eq!(
        first_author_surname(&mock_paper(&["O'Sullivan, D., Kumar, S."], None)),
        "O'Sullivan"
    );
}

#[test]
fn test_surname_display_string_from_search() {
    // A search candidate's "authors" is a single display string.
    let paper = mock_paper(&["Maria Garcia and Francois Leclerc"], None);
    assert_eq!(first_author_surname(&paper), "Leclerc");
}

// ============================================================================
// In-Text Markers
// ============================================================================

#[test]
fn test_in_text_all_styles_comma_author() {
    let paper = mock_paper(&["Zhang, L."], None);
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Apa, 1), "(Zhang, 2023)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Mla, 1), "(Zhang)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Ieee, 1), "[1]");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Chicago, 1), "(Zhang 2023)");
}

#[test]
fn test_in_text_all_styles_space_author() {
    let paper = mock_paper(&["Jane Doe"], None);
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Apa, 2), "(Doe, 2023)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Mla, 2), "(Doe)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Chicago, 2), "(Doe 2023)");
}

#[test]
fn test_in_text_no_authors() {
    let paper = mock_paper(&[], None);
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Apa, 1), "(Author, 2023)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Mla, 1), "(Author)");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Chicago, 1), "(Author 2023)");
}

#[test]
fn test_in_text_ieee_uses_index() {
    let paper = zhang_miller();
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Ieee, 7), "[7]");
    assert_eq!(format_in_text_citation(&paper, CitationStyle::Ieee, 12), "[12]");
}
