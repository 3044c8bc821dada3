//! Debounced suggestion pipelines: research topics for a theme, and a search
//! query derived from the section being written.
//!
//! Results land in shared state that handlers poll. Nothing here ever writes
//! to the search box on its own.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::assistant::ResearchAssistant;
use crate::debounce::Debouncer;
use crate::lock;
use crate::markup::plain_text;
use crate::search::SearchPanel;

pub const TOPIC_DEBOUNCE: Duration = Duration::from_millis(800);
/// A theme must be longer than this (trimmed) to trigger suggestions.
pub const TOPIC_MIN_THEME_CHARS: usize = 3;

pub const CONTEXT_DEBOUNCE: Duration = Duration::from_millis(5000);
/// Section text must be longer than this to trigger a query suggestion.
pub const CONTEXT_MIN_CHARS: usize = 100;
pub const CONTEXT_SAMPLE_CHARS: usize = 2000;

// ============================================================================
// Topic Suggestions
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TopicSnapshot {
    pub theme: String,
    pub topics: Vec<String>,
    pub loading: bool,
}

pub struct TopicSuggester {
    debouncer: Debouncer,
    state: Arc<Mutex<TopicSnapshot>>,
}

impl Default for TopicSuggester {
    fn default() -> Self {
        Self::with_delay(TOPIC_DEBOUNCE)
    }
}

impl TopicSuggester {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            state: Arc::new(Mutex::new(TopicSnapshot::default())),
        }
    }

    pub fn on_theme_change(&mut self, theme: &str, assistant: Arc<dyn ResearchAssistant>) {
        let trimmed = theme.trim().to_string();
        {
            let mut state = lock(&self.state);
            state.theme = theme.to_string();
            if trimmed.chars().count() <= TOPIC_MIN_THEME_CHARS {
                state.topics.clear();
                state.loading = false;
                self.debouncer.cancel();
                return;
            }
            state.loading = true;
        }

        let shared = self.state.clone();
        self.debouncer.schedule(move |generation| async move {
            let topics = match assistant.suggest_topics(&trimmed).await {
                Ok(topics) => topics,
                Err(e) => {
                    warn!(error = %e, "Topic suggestion failed");
                    Vec::new()
                }
            };
            if !generation.is_current() {
                return;
            }
            let mut state = lock(&shared);
            debug!(count = topics.len(), "Topic suggestions ready");
            state.topics = topics;
            state.loading = false;
        });
    }

    pub fn snapshot(&self) -> TopicSnapshot {
        lock(&self.state).clone()
    }
}

// ============================================================================
// Context Query Suggestion
// ============================================================================

pub struct ContextSuggester {
    debouncer: Debouncer,
    pending: Arc<Mutex<Option<String>>>,
}

impl Default for ContextSuggester {
    fn default() -> Self {
        Self::with_delay(CONTEXT_DEBOUNCE)
    }
}

impl ContextSuggester {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Called on every editor input event with the surface HTML.
    pub fn on_input(&mut self, html: &str, assistant: Arc<dyn ResearchAssistant>) {
        let text = plain_text(html);
        if text.chars().count() <= CONTEXT_MIN_CHARS {
            self.debouncer.cancel();
            return;
        }
        let sample: String = text.chars().take(CONTEXT_SAMPLE_CHARS).collect();
        let pending = self.pending.clone();
        self.debouncer.schedule(move |generation| async move {
            let query = match assistant.suggest_query(&sample).await {
                Ok(q) => q.trim().to_string(),
                Err(e) => {
                    warn!(error = %e, "Context suggestion failed");
                    return;
                }
            };
            if !generation.is_current() {
                return;
            }
            *lock(&pending) = if query.is_empty() { None } else { Some(query) };
        });
    }

    /// The pending suggestion, unless it already matches the search box.
    pub fn suggestion(&self, search_text: &str) -> Option<String> {
        lock(&self.pending)
            .as_ref()
            .filter(|q| q.trim() != search_text.trim())
            .cloned()
    }

    /// Copy the suggestion into the search box. Returns the accepted query.
    pub fn accept(&mut self, panel: &mut SearchPanel) -> Option<String> {
        let query = lock(&self.pending).take()?;
        panel.query = query.clone();
        Some(query)
    }

    pub fn dismiss(&mut self) {
        lock(&self.pending).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::AssistantError;
    use crate::models::{GroundedSource, Methodology, Question};
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers topic and query requests, counting calls.
    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        query: String,
        fail: bool,
    }

    #[async_trait]
    impl ResearchAssistant for Scripted {
        async fn suggest_topics(&self, theme: &str) -> Result<Vec<String>, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AssistantError::Unavailable("down".to_string()));
            }
            Ok(vec![format!("A Study of {}", theme)])
        }

        async fn extract_sections(
            &self,
            _raw: &str,
        ) -> Result<IndexMap<String, String>, AssistantError> {
            Ok(IndexMap::new())
        }

        async fn generate_section(
            &self,
            _topic: &str,
            _methodology: Methodology,
            _section: &str,
        ) -> Result<String, AssistantError> {
            Ok(String::new())
        }

        async fn generate_questionnaire(
            &self,
            _topic: &str,
            _methodology: Methodology,
        ) -> Result<Vec<Question>, AssistantError> {
            Ok(Vec::new())
        }

        async fn search_sources(
            &self,
            _query: &str,
        ) -> Result<Vec<GroundedSource>, AssistantError> {
            Ok(Vec::new())
        }

        async fn suggest_query(&self, _sample: &str) -> Result<String, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.query.clone())
        }
    }

    fn long_html() -> String {
        format!("<p>{}</p>", "remote work and employee wellbeing ".repeat(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_topics_debounced_to_last_theme() {
        let assistant = Arc::new(Scripted::default());
        let mut topics = TopicSuggester::default();
        for theme in ["remo", "remot", "remote work"] {
            topics.on_theme_change(theme, assistant.clone());
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(topics.snapshot().loading);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let snap = topics.snapshot();
        assert_eq!(snap.topics, vec!["A Study of remote work".to_string()]);
        assert!(!snap.loading);
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_theme_clears_topics() {
        let assistant = Arc::new(Scripted::default());
        let mut topics = TopicSuggester::default();
        topics.on_theme_change("climate", assistant.clone());
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(topics.snapshot().topics.len(), 1);

        topics.on_theme_change("  ab  ", assistant.clone());
        let snap = topics.snapshot();
        assert!(snap.topics.is_empty());
        assert!(!snap.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_topic_failure_is_silent_empty() {
        let assistant = Arc::new(Scripted { fail: true, ..Default::default() });
        let mut topics = TopicSuggester::default();
        topics.on_theme_change("urban health", assistant);
        tokio::time::sleep(Duration::from_millis(900)).await;
        let snap = topics.snapshot();
        assert!(snap.topics.is_empty());
        assert!(!snap.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_needs_enough_text() {
        let assistant = Arc::new(Scripted { query: "remote work".to_string(), ..Default::default() });
        let mut context = ContextSuggester::default();
        context.on_input("<p>too short</p>", assistant.clone());
        tokio::time::sleep(Duration::from_millis(6000)).await;
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.suggestion(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_suggestion_never_overwrites_search() {
        let assistant = Arc::new(Scripted {
            query: "remote work wellbeing".to_string(),
            ..Default::default()
        });
        let mut context = ContextSuggester::default();
        let mut panel = SearchPanel::new("my own query");

        context.on_input(&long_html(), assistant.clone());
        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(context.suggestion(&panel.query), None);
        tokio::time::sleep(Duration::from_millis(2)).await;

        assert_eq!(
            context.suggestion(&panel.query).as_deref(),
            Some("remote work wellbeing")
        );
        assert_eq!(panel.query, "my own query");

        assert_eq!(context.accept(&mut panel).as_deref(), Some("remote work wellbeing"));
        assert_eq!(panel.query, "remote work wellbeing");
        assert_eq!(context.suggestion(&panel.query), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_matching_search_text_is_hidden() {
        let assistant = Arc::new(Scripted { query: "remote work".to_string(), ..Default::default() });
        let mut context = ContextSuggester::default();
        context.on_input(&long_html(), assistant.clone());
        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(context.suggestion("remote work"), None);
        assert!(context.suggestion("other").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_keystrokes_reset_timer() {
        let assistant = Arc::new(Scripted { query: "q".to_string(), ..Default::default() });
        let mut context = ContextSuggester::default();
        for _ in 0..4 {
            context.on_input(&long_html(), assistant.clone());
            tokio::time::sleep(Duration::from_millis(3000)).await;
        }
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2001)).await;
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 1);
    }
}
