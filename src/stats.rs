//! Word/character counts and page estimates for the editor surface.
//!
//! Page numbers are a best-effort estimate from the rendered height the
//! client reports; they are not a print layout.

use serde::{Deserialize, Serialize};

use crate::markup::plain_text;

/// Letter page at 96 dpi.
pub const DEFAULT_PAGE_HEIGHT: f64 = 1056.0;
pub const DEFAULT_PAGE_GAP: f64 = 40.0;
/// How far below the scroll offset the "current" page is judged from.
pub const DEFAULT_LOOKAHEAD: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_height: f64,
    pub page_gap: f64,
    pub lookahead: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_height: DEFAULT_PAGE_HEIGHT,
            page_gap: DEFAULT_PAGE_GAP,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

/// Measurements reported by the client on input and scroll events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub content_height: f64,
    #[serde(default)]
    pub scroll_top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub words: usize,
    pub chars: usize,
    pub total_pages: u32,
    pub current_page: u32,
}

pub fn total_pages(content_height: f64, page_height: f64) -> u32 {
    if page_height <= 0.0 || !content_height.is_finite() || content_height <= 0.0 {
        return 1;
    }
    ((content_height / page_height).ceil() as u32).max(1)
}

pub fn current_page(scroll_top: f64, geometry: &PageGeometry, total: u32) -> u32 {
    let stride = geometry.page_height + geometry.page_gap;
    let total = total.max(1);
    if stride <= 0.0 {
        return 1;
    }
    let raw = ((scroll_top.max(0.0) + geometry.lookahead) / stride).ceil();
    (raw.max(1.0) as u32).clamp(1, total)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Recompute all statistics for the surface HTML at the given viewport.
pub fn compute(html: &str, viewport: &Viewport, geometry: &PageGeometry) -> DocumentStats {
    let text = plain_text(html);
    let total = total_pages(viewport.content_height, geometry.page_height);
    DocumentStats {
        words: word_count(&text),
        chars: char_count(&text),
        total_pages: total,
        current_page: current_page(viewport.scroll_top, geometry, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_minimum_one() {
        assert_eq!(total_pages(0.0, 1056.0), 1);
        assert_eq!(total_pages(-10.0, 1056.0), 1);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(2200.0, 1056.0), 3);
        assert_eq!(total_pages(1056.0, 1056.0), 1);
        assert_eq!(total_pages(1057.0, 1056.0), 2);
    }

    #[test]
    fn test_current_page_clamped() {
        let g = PageGeometry::default();
        assert_eq!(current_page(0.0, &g, 3), 1);
        // (1200 + 500) / 1096 = 1.55 -> 2
        assert_eq!(current_page(1200.0, &g, 3), 2);
        assert_eq!(current_page(50_000.0, &g, 3), 3);
        assert_eq!(current_page(50_000.0, &g, 0), 1);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  "), 0);
        assert_eq!(word_count("one two  three"), 3);
    }

    #[test]
    fn test_compute_from_html() {
        let stats = compute(
            "<p>one <i>two</i></p><p>three</p>",
            &Viewport { content_height: 2200.0, scroll_top: 0.0 },
            &PageGeometry::default(),
        );
        assert_eq!(stats.words, 3);
        assert_eq!(stats.chars, "one two\nthree".len());
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.current_page, 1);
    }

    #[test]
    fn test_compute_empty_surface() {
        let stats = compute("", &Viewport::default(), &PageGeometry::default());
        assert_eq!(stats, DocumentStats { words: 0, chars: 0, total_pages: 1, current_page: 1 });
    }
}
