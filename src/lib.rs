//! Manuscript library - re-exports for testing and external use.
//!
//! This module wires the application's modules together: shared state,
//! per-project workspaces, and the HTTP router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::routing::{get, post, put};
use axum::Router;
use rand::Rng;
use tracing::info;

pub mod assistant;
pub mod citations;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod handlers;
pub mod import;
pub mod markup;
pub mod models;
pub mod search;
pub mod sections;
pub mod stats;
pub mod store;
pub mod suggest;
pub mod survey;
pub mod workflow;

use assistant::{GeminiAssistant, OfflineAssistant, ResearchAssistant};
use config::Config;
use editor::Editor;
use models::Project;
use search::SearchPanel;
use stats::Viewport;
use store::{ProjectStore, StoreError};
use suggest::{ContextSuggester, TopicSuggester};
use workflow::Flow;

// ============================================================================
// Helpers
// ============================================================================

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
pub const ID_LEN: usize = 9;

/// Random 9-character lowercase base-36 id.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Workspace
// ============================================================================

/// Per-project editing session: the editor surface, the source panel and the
/// context suggestion pipeline.
pub struct Workspace {
    pub editor: Editor,
    pub search: SearchPanel,
    pub context: ContextSuggester,
    pub viewport: Viewport,
    /// Section shown in the navigation; receives citations when no section
    /// is open in the editor.
    pub active_section: String,
}

impl Workspace {
    pub fn new(project: &Project) -> Self {
        let query = if project.title.trim().is_empty() {
            &project.theme
        } else {
            &project.title
        };
        let active_section = project
            .sections
            .keys()
            .next()
            .unwrap_or(models::DEFAULT_SECTIONS[0])
            .to_string();
        Self {
            editor: Editor::default(),
            search: SearchPanel::new(query),
            context: ContextSuggester::default(),
            viewport: Viewport::default(),
            active_section,
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub config: Config,
    pub store: ProjectStore,
    pub assistant: Arc<dyn ResearchAssistant>,
    pub workspaces: Mutex<HashMap<String, Workspace>>,
    pub flow: Mutex<Flow>,
    pub topics: Mutex<TopicSuggester>,
}

impl AppState {
    /// Open the database and pick an assistant from the configuration.
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let store = ProjectStore::open(&config.db_path)?;
        let assistant: Arc<dyn ResearchAssistant> = match &config.gemini_api_key {
            Some(key) => {
                info!(model = %config.gemini_model, "Using Gemini assistant");
                Arc::new(GeminiAssistant::new(key.clone(), config.gemini_model.clone()))
            }
            None => {
                info!("GEMINI_API_KEY not set; assistant features are disabled");
                Arc::new(OfflineAssistant)
            }
        };
        Ok(Self::with_parts(config, store, assistant))
    }

    pub fn with_parts(
        config: Config,
        store: ProjectStore,
        assistant: Arc<dyn ResearchAssistant>,
    ) -> Self {
        Self {
            config,
            store,
            assistant,
            workspaces: Mutex::new(HashMap::new()),
            flow: Mutex::new(Flow::default()),
            topics: Mutex::new(TopicSuggester::default()),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Flow & topics
        .route("/api/flow", get(handlers::get_flow).post(handlers::apply_flow))
        .route("/api/topics", get(handlers::get_topics).post(handlers::set_theme))
        // Projects
        .route("/api/projects", get(handlers::list_projects).post(handlers::create_project))
        .route("/api/projects/import", post(handlers::import_project))
        .route(
            "/api/projects/{id}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        // Sections
        .route(
            "/api/projects/{id}/sections",
            get(handlers::list_sections).post(handlers::add_section),
        )
        .route(
            "/api/projects/{id}/sections/{name}",
            put(handlers::put_section).delete(handlers::remove_section),
        )
        // Editor
        .route("/api/projects/{id}/editor", get(handlers::editor_view))
        .route("/api/projects/{id}/editor/open", post(handlers::editor_open))
        .route("/api/projects/{id}/editor/input", post(handlers::editor_input))
        .route("/api/projects/{id}/editor/command", post(handlers::editor_command))
        .route("/api/projects/{id}/editor/caret", post(handlers::editor_caret))
        .route("/api/projects/{id}/editor/blur", post(handlers::editor_blur))
        .route("/api/projects/{id}/editor/viewport", post(handlers::editor_viewport))
        // Sources
        .route("/api/projects/{id}/sources", get(handlers::sources_view))
        .route("/api/projects/{id}/sources/search", post(handlers::search_sources))
        .route("/api/projects/{id}/sources/cite", post(handlers::cite_source))
        .route(
            "/api/projects/{id}/suggestion",
            get(handlers::get_suggestion).delete(handlers::dismiss_suggestion),
        )
        .route("/api/projects/{id}/suggestion/accept", post(handlers::accept_suggestion))
        // Generation & survey
        .route("/api/projects/{id}/generate", post(handlers::generate_section))
        .route("/api/projects/{id}/questionnaire", post(handlers::generate_questionnaire))
        .route("/api/projects/{id}/questions", put(handlers::put_questions))
        .route(
            "/api/projects/{id}/survey",
            get(handlers::get_survey).post(handlers::submit_survey),
        )
        .route("/api/projects/{id}/responses", get(handlers::list_responses))
        .with_state(state)
}

// Re-export commonly used types
pub use citations::{first_author_surname, format_citation, format_in_text_citation};
pub use editor::{Alignment, Attr, EditorCommand, EditorState, HtmlSurface, RichText};
pub use error::ApiError;
pub use models::{
    CitationStyle, GroundedSource, Methodology, Paper, ProjectSummary, Question, QuestionType,
};
pub use search::{cite, CiteOutcome, SearchTicket};
pub use sections::{SectionError, SectionStore};
pub use stats::{DocumentStats, PageGeometry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_workspace_query_defaults_to_title_then_theme() {
        let mut p = Project::new("AI Tutors", "education", CitationStyle::Apa, Methodology::Qualitative);
        assert_eq!(Workspace::new(&p).search.query, "AI Tutors");
        p.title = String::new();
        let ws = Workspace::new(&p);
        assert_eq!(ws.search.query, "education");
        assert_eq!(ws.active_section, "Abstract");
    }
}
