//! Editor surface bound to one section of a project at a time.
//!
//! Rich-text mutation goes through the [`RichText`] capability so the editing
//! backend can be swapped without changing how the editor syncs with the
//! section store. [`HtmlSurface`] is the built-in backend: an HTML string with
//! a byte-offset selection.
//!
//! Every input event and every formatting command pushes the surface HTML
//! into the project immediately, so store and surface never diverge. Flushing
//! on blur or section switch only writes when the surface holds something the
//! store has not seen yet.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::Project;

#[derive(Debug, Error, PartialEq)]
pub enum EditorError {
    #[error("No section is open in the editor")]
    NotBound,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Ordered => "ol",
            ListKind::Unordered => "ul",
        }
    }
}

/// Formatting state that can be queried at the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attr {
    Bold,
    Italic,
    Underline,
    OrderedList,
    UnorderedList,
}

impl Attr {
    fn tags(self) -> &'static [&'static str] {
        match self {
            Attr::Bold => &["b", "strong"],
            Attr::Italic => &["i", "em"],
            Attr::Underline => &["u"],
            Attr::OrderedList => &["ol"],
            Attr::UnorderedList => &["ul"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    Bold,
    Italic,
    Underline,
    Align { alignment: Alignment },
    OrderedList,
    UnorderedList,
    InsertTable { rows: usize, cols: usize },
    PageBreak,
}

pub const MAX_TABLE_DIM: usize = 20;
pub const PAGE_BREAK_HTML: &str =
    r#"<div class="page-break" contenteditable="false"></div><p><br></p>"#;

// ============================================================================
// Rich-Text Capability
// ============================================================================

pub trait RichText {
    fn html(&self) -> &str;
    /// Replace the whole document. The caret moves to the end.
    fn load(&mut self, html: &str);
    fn selection(&self) -> (usize, usize);
    fn set_selection(&mut self, start: usize, end: usize);
    fn caret(&self) -> usize {
        self.selection().1
    }

    fn bold(&mut self) -> bool;
    fn italic(&mut self) -> bool;
    fn underline(&mut self) -> bool;
    fn align(&mut self, alignment: Alignment) -> bool;
    fn list(&mut self, kind: ListKind) -> bool;
    fn insert_table(&mut self, rows: usize, cols: usize) -> bool;
    fn page_break(&mut self) -> bool;
    /// Replace the selection with `fragment`, leaving the caret after it.
    fn insert_html(&mut self, fragment: &str);
    fn query_state(&self, attr: Attr) -> bool;

    /// Dispatch a command. Returns whether the document changed.
    fn apply(&mut self, command: EditorCommand) -> bool {
        match command {
            EditorCommand::Bold => self.bold(),
            EditorCommand::Italic => self.italic(),
            EditorCommand::Underline => self.underline(),
            EditorCommand::Align { alignment } => self.align(alignment),
            EditorCommand::OrderedList => self.list(ListKind::Ordered),
            EditorCommand::UnorderedList => self.list(ListKind::Unordered),
            EditorCommand::InsertTable { rows, cols } => self.insert_table(rows, cols),
            EditorCommand::PageBreak => self.page_break(),
        }
    }
}

// ============================================================================
// HTML Surface
// ============================================================================

fn tag_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*?(/?)>").unwrap())
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "col", "wbr"];

/// An open element found while scanning the document prefix.
struct OpenTag {
    name: String,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlSurface {
    html: String,
    start: usize,
    end: usize,
}

impl HtmlSurface {
    pub fn new(html: &str) -> Self {
        let mut surface = Self::default();
        surface.load(html);
        surface
    }

    /// Move an offset onto a char boundary and out of any tag it falls inside.
    fn snap(&self, pos: usize) -> usize {
        let mut pos = pos.min(self.html.len());
        while !self.html.is_char_boundary(pos) {
            pos -= 1;
        }
        let before = &self.html[..pos];
        if let Some(lt) = before.rfind('<') {
            let inside = before.rfind('>').map_or(true, |gt| gt < lt);
            if inside {
                return match self.html[pos..].find('>') {
                    Some(close) => pos + close + 1,
                    None => self.html.len(),
                };
            }
        }
        pos
    }

    /// Elements still open at `pos`, outermost first.
    fn open_tags_at(&self, pos: usize) -> Vec<OpenTag> {
        let mut stack: Vec<OpenTag> = Vec::new();
        for caps in tag_token_re().captures_iter(&self.html[..pos]) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let name = caps[2].to_lowercase();
            let closing = &caps[1] == "/";
            let self_closing = &caps[3] == "/";
            if VOID_TAGS.contains(&name.as_str()) || self_closing {
                continue;
            }
            if closing {
                if let Some(idx) = stack.iter().rposition(|t| t.name == name) {
                    stack.truncate(idx);
                }
            } else {
                stack.push(OpenTag {
                    name,
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        }
        stack
    }

    fn selected(&self) -> &str {
        &self.html[self.start..self.end]
    }

    fn replace_selection(&mut self, fragment: &str) {
        self.html.replace_range(self.start..self.end, fragment);
        self.start += fragment.len();
        self.end = self.start;
    }

    /// Wrap the selection in `open`/`close`, keeping the selection over the
    /// wrapped content.
    fn wrap_selection(&mut self, open: &str, close: &str) {
        self.html.insert_str(self.end, close);
        self.html.insert_str(self.start, open);
        self.start += open.len();
        self.end += open.len();
    }

    /// Remove `open`/`close` immediately around the selection if present.
    fn unwrap_selection(&mut self, open: &str, close: &str) -> bool {
        let exact = self.start >= open.len()
            && self.html[..self.start].ends_with(open)
            && self.html[self.end..].starts_with(close);
        if !exact {
            return false;
        }
        self.html.replace_range(self.end..self.end + close.len(), "");
        self.html.replace_range(self.start - open.len()..self.start, "");
        self.start -= open.len();
        self.end -= open.len();
        true
    }

    fn toggle_inline(&mut self, attr: Attr) -> bool {
        if self.start == self.end {
            return false;
        }
        let tags = attr.tags();
        for tag in tags {
            if self.unwrap_selection(&format!("<{}>", tag), &format!("</{}>", tag)) {
                return true;
            }
        }
        if self.query_state(attr) {
            return false;
        }
        let tag = tags[0];
        self.wrap_selection(&format!("<{}>", tag), &format!("</{}>", tag));
        true
    }
}

impl RichText for HtmlSurface {
    fn html(&self) -> &str {
        &self.html
    }

    fn load(&mut self, html: &str) {
        self.html = html.to_string();
        self.start = self.html.len();
        self.end = self.start;
    }

    fn selection(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    fn set_selection(&mut self, start: usize, end: usize) {
        let (a, b) = if start <= end { (start, end) } else { (end, start) };
        self.start = self.snap(a);
        self.end = self.snap(b).max(self.start);
    }

    fn bold(&mut self) -> bool {
        self.toggle_inline(Attr::Bold)
    }

    fn italic(&mut self) -> bool {
        self.toggle_inline(Attr::Italic)
    }

    fn underline(&mut self) -> bool {
        self.toggle_inline(Attr::Underline)
    }

    fn align(&mut self, alignment: Alignment) -> bool {
        let block = self
            .open_tags_at(self.start)
            .into_iter()
            .rev()
            .find(|t| t.name == "p" || t.name == "div");

        if let Some(block) = block {
            let new_open = format!("<{} style=\"text-align: {}\">", block.name, alignment.css());
            let old_len = block.end - block.start;
            self.html.replace_range(block.start..block.end, &new_open);
            let shift = new_open.len() as isize - old_len as isize;
            self.start = (self.start as isize + shift) as usize;
            self.end = (self.end as isize + shift) as usize;
            return true;
        }

        if self.start == self.end {
            return false;
        }
        self.wrap_selection(
            &format!("<div style=\"text-align: {}\">", alignment.css()),
            "</div>",
        );
        true
    }

    fn list(&mut self, kind: ListKind) -> bool {
        let open = format!("<{}><li>", kind.tag());
        let close = format!("</li></{}>", kind.tag());
        if self.unwrap_selection(&open, &close) {
            let items = self.selected().replace("</li><li>", "<br>");
            let start = self.start;
            self.replace_selection(&items);
            self.start = start;
            self.end = start + items.len();
            return true;
        }
        if self.start == self.end {
            self.html.insert_str(self.start, &format!("{}<br>{}", open, close));
            self.start += open.len();
            self.end = self.start;
            return true;
        }
        let items = self
            .selected()
            .split("<br>")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("</li><li>");
        let fragment = format!("{}{}{}", open, items, close);
        let start = self.start;
        self.replace_selection(&fragment);
        self.start = start + open.len();
        self.end = self.start + items.len();
        true
    }

    fn insert_table(&mut self, rows: usize, cols: usize) -> bool {
        let rows = rows.clamp(1, MAX_TABLE_DIM);
        let cols = cols.clamp(1, MAX_TABLE_DIM);
        let mut table = String::from("<table class=\"manuscript-table\"><tbody>");
        for _ in 0..rows {
            table.push_str("<tr>");
            for _ in 0..cols {
                table.push_str("<td>&nbsp;</td>");
            }
            table.push_str("</tr>");
        }
        table.push_str("</tbody></table><p><br></p>");
        self.insert_html(&table);
        true
    }

    fn page_break(&mut self) -> bool {
        self.insert_html(PAGE_BREAK_HTML);
        true
    }

    fn insert_html(&mut self, fragment: &str) {
        self.replace_selection(fragment);
    }

    fn query_state(&self, attr: Attr) -> bool {
        let tags = attr.tags();
        self.open_tags_at(self.start)
            .iter()
            .any(|t| tags.contains(&t.name.as_str()))
    }
}

// ============================================================================
// Editor State Machine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "section", rename_all = "lowercase")]
pub enum EditorState {
    Unbound,
    Idle(String),
    /// Edited since it was opened or last blurred.
    Dirty(String),
}

pub struct Editor<R: RichText = HtmlSurface> {
    surface: R,
    state: EditorState,
    /// Content most recently written to the store for the bound section.
    last_pushed: Option<String>,
}

impl Default for Editor<HtmlSurface> {
    fn default() -> Self {
        Self::with_surface(HtmlSurface::default())
    }
}

impl<R: RichText> Editor<R> {
    pub fn with_surface(surface: R) -> Self {
        Self {
            surface,
            state: EditorState::Unbound,
            last_pushed: None,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn section(&self) -> Option<&str> {
        match &self.state {
            EditorState::Unbound => None,
            EditorState::Idle(s) | EditorState::Dirty(s) => Some(s),
        }
    }

    fn bound(&self) -> Result<String, EditorError> {
        self.section().map(str::to_string).ok_or(EditorError::NotBound)
    }

    fn push(&mut self, project: &mut Project, section: &str) {
        let html = self.surface.html().to_string();
        project.set_section(section, &html);
        self.last_pushed = Some(html);
    }

    /// Write the surface back if it holds content the store has not seen.
    fn flush(&mut self, project: &mut Project) -> bool {
        let Some(section) = self.section().map(str::to_string) else {
            return false;
        };
        if self.last_pushed.as_deref() == Some(self.surface.html()) {
            return false;
        }
        self.push(project, &section);
        true
    }

    /// Bind the surface to `section`, flushing the section being left first.
    pub fn open(&mut self, project: &mut Project, section: &str) {
        self.flush(project);
        let content = project.section(section).to_string();
        self.surface.load(&content);
        self.last_pushed = Some(content);
        self.state = EditorState::Idle(section.to_string());
    }

    /// A user input event replaced the surface content.
    pub fn input(&mut self, project: &mut Project, html: &str) -> Result<(), EditorError> {
        let section = self.bound()?;
        self.surface.load(html);
        self.push(project, &section);
        self.state = EditorState::Dirty(section);
        Ok(())
    }

    pub fn select(&mut self, start: usize, end: usize) -> Result<(), EditorError> {
        self.bound()?;
        self.surface.set_selection(start, end);
        Ok(())
    }

    pub fn command(
        &mut self,
        project: &mut Project,
        command: EditorCommand,
    ) -> Result<bool, EditorError> {
        let section = self.bound()?;
        let changed = self.surface.apply(command);
        if changed {
            self.push(project, &section);
            self.state = EditorState::Dirty(section);
        }
        Ok(changed)
    }

    /// Insert literal HTML at the caret. The selection is the only state touched.
    pub fn insert_at_caret(
        &mut self,
        project: &mut Project,
        fragment: &str,
    ) -> Result<(), EditorError> {
        let section = self.bound()?;
        self.surface.insert_html(fragment);
        self.push(project, &section);
        Ok(())
    }

    pub fn query_state(&self, attr: Attr) -> bool {
        self.surface.query_state(attr)
    }

    /// Unbind without writing back, for when the bound section is removed.
    pub fn detach(&mut self) {
        self.surface.load("");
        self.last_pushed = None;
        self.state = EditorState::Unbound;
    }

    pub fn blur(&mut self, project: &mut Project) {
        self.flush(project);
        if let EditorState::Dirty(section) = &self.state {
            self.state = EditorState::Idle(section.clone());
        }
    }

    /// Reload the bound section after something other than the editor wrote
    /// to it, keeping the selection where possible.
    pub fn refresh(&mut self, project: &Project) {
        let Some(section) = self.section() else {
            return;
        };
        let content = project.section(section).to_string();
        if content == self.surface.html() {
            self.last_pushed = Some(content);
            return;
        }
        let (start, end) = self.surface.selection();
        self.surface.load(&content);
        self.surface.set_selection(start, end);
        self.last_pushed = Some(content);
    }

    /// Hint shown over an empty section. Never part of the stored content.
    pub fn placeholder(&self, project: &Project) -> Option<String> {
        let section = self.section()?;
        if project.section(section).is_empty() {
            Some(format!(
                "Begin typing the {} content here...",
                section.to_lowercase()
            ))
        } else {
            None
        }
    }
}
