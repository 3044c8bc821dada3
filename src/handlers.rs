//! HTTP route handlers for the manuscript API.
//!
//! Every write to an existing project happens under the workspace lock, held
//! for the whole load-mutate-save cycle, so two requests never interleave and
//! a delete cannot be undone by a save that loaded the project before it.
//! The lock is never held across an assistant call.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::editor::{Attr, EditorCommand, EditorState};
use crate::error::ApiError;
use crate::import::{extract_text, import_manuscript, Upload};
use crate::models::{
    AddSectionRequest, CiteRequest, CreateProjectRequest, GenerateRequest, GroundedSource, Project,
    ProjectSummary, Question, QuestionsRequest, SearchRequest, SectionContentRequest,
    SurveyResponse, SurveySubmission, ThemeRequest,
};
use crate::search::{cite, CiteOutcome};
use crate::sections::{SectionError, SectionStore};
use crate::stats::{compute, DocumentStats, Viewport};
use crate::suggest::TopicSnapshot;
use crate::survey::validate_answers;
use crate::workflow::{Action, Effect, Flow};
use crate::{generate_id, lock, AppState, Workspace};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run `f` against the stored project and its workspace, then save.
fn with_workspace<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut Project, &mut Workspace) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let mut spaces = lock(&state.workspaces);
    let mut project = state.store.get(id)?;
    let workspace = spaces
        .entry(id.to_string())
        .or_insert_with(|| Workspace::new(&project));
    let out = f(&mut project, workspace)?;
    state.store.save(&project)?;
    Ok(out)
}

/// Mutate a stored project that has no workspace state involved.
fn with_project<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut Project) -> T,
) -> Result<T, ApiError> {
    let _spaces = lock(&state.workspaces);
    Ok(state.store.update(id, f)?)
}

fn new_project_for(state: &AppState, mut project: Project) -> Result<Project, ApiError> {
    project.owner = state.config.author.clone();
    state.store.save(&project)?;
    info!(id = %project.id, title = %project.title, "Created project");
    Ok(project)
}

// ============================================================================
// Flow & Topics
// ============================================================================

#[derive(Serialize)]
pub struct FlowResponse {
    pub flow: Flow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
}

pub async fn get_flow(State(state): State<Arc<AppState>>) -> Json<Flow> {
    Json(lock(&state.flow).clone())
}

pub async fn apply_flow(
    State(state): State<Arc<AppState>>,
    Json(action): Json<Action>,
) -> ApiResult<FlowResponse> {
    if let Action::Select { project_id } = &action {
        if !state.store.exists(project_id)? {
            return Err(ApiError::not_found(format!("Project not found: {}", project_id)));
        }
    }

    let mut flow = lock(&state.flow);
    let project = match flow.apply(action)? {
        Effect::None => None,
        Effect::CreateProject(project) => Some(new_project_for(&state, project)?),
    };
    Ok(Json(FlowResponse {
        flow: flow.clone(),
        project,
    }))
}

pub async fn set_theme(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ThemeRequest>,
) -> Json<TopicSnapshot> {
    let mut topics = lock(&state.topics);
    topics.on_theme_change(&req.theme, state.assistant.clone());
    Json(topics.snapshot())
}

pub async fn get_topics(State(state): State<Arc<AppState>>) -> Json<TopicSnapshot> {
    Json(lock(&state.topics).snapshot())
}

// ============================================================================
// Projects
// ============================================================================

pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ProjectSummary>> {
    let projects = state.store.list()?;
    Ok(Json(projects.iter().map(ProjectSummary::from).collect()))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Response, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    let project = Project::new(&req.title, &req.theme, req.citation_style, req.methodology);
    let project = new_project_for(&state, project)?;
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Project> {
    Ok(Json(state.store.get(&id)?))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existed = {
        let mut spaces = lock(&state.workspaces);
        spaces.remove(&id);
        state.store.delete(&id)?
    };
    if !existed {
        return Err(ApiError::not_found(format!("Project not found: {}", id)));
    }
    // Always legal; only clears the selection.
    let _ = lock(&state.flow).apply(Action::Deleted { project_id: id.clone() });
    info!(id = %id, "Deleted project");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_project(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("manuscript.txt").to_string();
            let content_type = field.content_type().unwrap_or("").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
            upload = Some(Upload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            break;
        }
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let parse_target = upload.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&parse_target))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    let project = import_manuscript(&upload, &text, state.assistant.as_ref()).await?;
    let project = new_project_for(&state, project)?;

    let mut flow = lock(&state.flow);
    if flow.modal_open {
        let _ = flow.apply(Action::Imported { project_id: project.id.clone() });
    }
    Ok((StatusCode::CREATED, Json(project)).into_response())
}

// ============================================================================
// Sections
// ============================================================================

pub async fn list_sections(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SectionStore> {
    Ok(Json(state.store.get(&id)?.sections))
}

pub async fn add_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddSectionRequest>,
) -> Result<Response, ApiError> {
    let sections = with_workspace(&state, &id, |project, _| {
        project.add_section(&req.name)?;
        Ok(project.sections.clone())
    })?;
    Ok((StatusCode::CREATED, Json(sections)).into_response())
}

pub async fn put_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    Json(req): Json<SectionContentRequest>,
) -> ApiResult<SectionStore> {
    with_workspace(&state, &id, |project, ws| {
        if !project.sections.contains(&name) {
            return Err(SectionError::NotFound(name.clone()).into());
        }
        project.set_section(&name, &req.content);
        ws.editor.refresh(project);
        Ok(Json(project.sections.clone()))
    })
}

pub async fn remove_section(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<SectionStore> {
    with_workspace(&state, &id, |project, ws| {
        project.remove_section(&name)?;
        if ws.editor.section() == Some(name.as_str()) {
            ws.editor.detach();
        }
        if ws.active_section == name {
            ws.active_section = project.sections.keys().next().unwrap_or("").to_string();
        }
        Ok(Json(project.sections.clone()))
    })
}

// ============================================================================
// Editor
// ============================================================================

#[derive(Serialize)]
pub struct Formats {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub ordered_list: bool,
    pub unordered_list: bool,
}

#[derive(Serialize)]
pub struct EditorView {
    pub state: EditorState,
    pub html: String,
    pub selection: (usize, usize),
    pub placeholder: Option<String>,
    pub formats: Formats,
    pub stats: DocumentStats,
}

fn editor_view_of(state: &AppState, project: &Project, ws: &Workspace) -> EditorView {
    use crate::editor::RichText;

    let editor = &ws.editor;
    let html = editor.surface().html().to_string();
    EditorView {
        state: editor.state().clone(),
        selection: editor.surface().selection(),
        placeholder: editor.placeholder(project),
        formats: Formats {
            bold: editor.query_state(Attr::Bold),
            italic: editor.query_state(Attr::Italic),
            underline: editor.query_state(Attr::Underline),
            ordered_list: editor.query_state(Attr::OrderedList),
            unordered_list: editor.query_state(Attr::UnorderedList),
        },
        stats: compute(&html, &ws.viewport, &state.config.page),
        html,
    }
}

pub async fn editor_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<EditorView> {
    with_workspace(&state, &id, |project, ws| Ok(Json(editor_view_of(&state, project, ws))))
}

#[derive(Deserialize)]
pub struct OpenRequest {
    pub section: String,
}

pub async fn editor_open(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OpenRequest>,
) -> ApiResult<EditorView> {
    with_workspace(&state, &id, |project, ws| {
        if !project.sections.contains(&req.section) {
            return Err(SectionError::NotFound(req.section.clone()).into());
        }
        ws.editor.open(project, &req.section);
        ws.active_section = req.section.clone();
        Ok(Json(editor_view_of(&state, project, ws)))
    })
}

#[derive(Deserialize)]
pub struct InputRequest {
    pub html: String,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

pub async fn editor_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> ApiResult<DocumentStats> {
    with_workspace(&state, &id, |project, ws| {
        ws.editor.input(project, &req.html)?;
        if let Some(viewport) = req.viewport {
            ws.viewport = viewport;
        }
        ws.context.on_input(&req.html, state.assistant.clone());
        Ok(Json(compute(&req.html, &ws.viewport, &state.config.page)))
    })
}

pub async fn editor_command(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(command): Json<EditorCommand>,
) -> ApiResult<EditorView> {
    with_workspace(&state, &id, |project, ws| {
        ws.editor.command(project, command)?;
        Ok(Json(editor_view_of(&state, project, ws)))
    })
}

#[derive(Deserialize)]
pub struct CaretRequest {
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
}

pub async fn editor_caret(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CaretRequest>,
) -> ApiResult<EditorView> {
    with_workspace(&state, &id, |project, ws| {
        ws.editor.select(req.start, req.end.unwrap_or(req.start))?;
        Ok(Json(editor_view_of(&state, project, ws)))
    })
}

pub async fn editor_blur(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<EditorView> {
    with_workspace(&state, &id, |project, ws| {
        ws.editor.blur(project);
        Ok(Json(editor_view_of(&state, project, ws)))
    })
}

pub async fn editor_viewport(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(viewport): Json<Viewport>,
) -> ApiResult<DocumentStats> {
    use crate::editor::RichText;

    with_workspace(&state, &id, |_, ws| {
        ws.viewport = viewport;
        Ok(Json(compute(
            ws.editor.surface().html(),
            &ws.viewport,
            &state.config.page,
        )))
    })
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Serialize)]
pub struct SourcesView {
    pub query: String,
    pub results: Vec<GroundedSource>,
    pub is_searching: bool,
    pub suggestion: Option<String>,
}

fn sources_of(ws: &Workspace) -> SourcesView {
    let view = ws.search.view();
    SourcesView {
        query: view.query.to_string(),
        results: view.results.to_vec(),
        is_searching: view.is_searching,
        suggestion: ws.context.suggestion(&ws.search.query),
    }
}

pub async fn sources_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SourcesView> {
    with_workspace(&state, &id, |_, ws| Ok(Json(sources_of(ws))))
}

pub async fn search_sources(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SourcesView> {
    let ticket = with_workspace(&state, &id, |_, ws| Ok(ws.search.begin(&req.query)))?;
    let Some(ticket) = ticket else {
        return with_workspace(&state, &id, |_, ws| Ok(Json(sources_of(ws))));
    };

    let result = state.assistant.search_sources(&ticket.query).await;

    with_workspace(&state, &id, |_, ws| match result {
        Ok(results) => {
            ws.search.complete(&ticket, results);
            Ok(Json(sources_of(ws)))
        }
        Err(e) => {
            ws.search.fail(&ticket);
            Err(e.into())
        }
    })
}

pub async fn cite_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CiteRequest>,
) -> ApiResult<CiteOutcome> {
    with_workspace(&state, &id, |project, ws| {
        let active = ws.active_section.clone();
        Ok(Json(cite(project, &mut ws.editor, &active, &req.source)))
    })
}

#[derive(Serialize)]
pub struct SuggestionResponse {
    pub suggestion: Option<String>,
}

pub async fn get_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SuggestionResponse> {
    with_workspace(&state, &id, |_, ws| {
        Ok(Json(SuggestionResponse {
            suggestion: ws.context.suggestion(&ws.search.query),
        }))
    })
}

pub async fn dismiss_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_workspace(&state, &id, |_, ws| {
        ws.context.dismiss();
        Ok(StatusCode::NO_CONTENT)
    })
}

pub async fn accept_suggestion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SourcesView> {
    with_workspace(&state, &id, |_, ws| {
        if ws.context.accept(&mut ws.search).is_none() {
            return Err(ApiError::not_found("No suggestion pending"));
        }
        Ok(Json(sources_of(ws)))
    })
}

// ============================================================================
// Generation
// ============================================================================

pub async fn generate_section(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<SectionStore> {
    let project = state.store.get(&id)?;
    if !project.sections.contains(&req.section) {
        return Err(SectionError::NotFound(req.section).into());
    }
    let html = state
        .assistant
        .generate_section(&project.title, project.methodology, &req.section)
        .await?;

    with_workspace(&state, &id, |project, ws| {
        project.set_section(&req.section, &html);
        ws.editor.refresh(project);
        Ok(Json(project.sections.clone()))
    })
}

pub async fn generate_questionnaire(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Question>> {
    let project = state.store.get(&id)?;
    let questions = state
        .assistant
        .generate_questionnaire(&project.title, project.methodology)
        .await?;
    if questions.is_empty() {
        warn!(id = %id, "Questionnaire generation produced no questions");
    }
    let stored = with_project(&state, &id, |p| {
        p.set_questions(questions);
        p.questions.clone()
    })?;
    Ok(Json(stored))
}

pub async fn put_questions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<QuestionsRequest>,
) -> ApiResult<Vec<Question>> {
    let stored = with_project(&state, &id, |p| {
        p.set_questions(req.questions);
        p.questions.clone()
    })?;
    Ok(Json(stored))
}

// ============================================================================
// Survey
// ============================================================================

#[derive(Serialize)]
pub struct SurveyForm {
    pub title: String,
    pub questions: Vec<Question>,
}

pub async fn get_survey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SurveyForm> {
    let project = state.store.get(&id)?;
    Ok(Json(SurveyForm {
        title: project.title,
        questions: project.questions,
    }))
}

pub async fn submit_survey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SurveySubmission>,
) -> Result<Response, ApiError> {
    let _spaces = lock(&state.workspaces);
    let project = state.store.get(&id)?;
    let answers = validate_answers(&project.questions, &req.answers)?;
    let response = SurveyResponse {
        id: generate_id(),
        project_id: id,
        answers,
        submitted_at: chrono::Utc::now(),
    };
    state.store.add_response(&response)?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

pub async fn list_responses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<SurveyResponse>> {
    state.store.get(&id)?;
    Ok(Json(state.store.responses_for(&id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::OfflineAssistant;
    use crate::config::Config;
    use crate::models::{CitationStyle, Methodology, QuestionType};
    use crate::store::ProjectStore;
    use std::time::Duration;

    fn state_with_project() -> (Arc<AppState>, String) {
        let state = AppState::with_parts(
            Config::default(),
            ProjectStore::temporary().unwrap(),
            Arc::new(OfflineAssistant),
        );
        let project = Project::new(
            "Remote work",
            "",
            CitationStyle::Apa,
            Methodology::Qualitative,
        );
        state.store.save(&project).unwrap();
        (Arc::new(state), project.id)
    }

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_type: QuestionType::Text,
            label: "Comments".to_string(),
            options: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_questions_wait_for_in_flight_section_save() {
        let (state, id) = state_with_project();

        // Hold the lock the way an editor save does, with a copy loaded first.
        let spaces = lock(&state.workspaces);
        let mut loaded = state.store.get(&id).unwrap();

        let task = tokio::spawn(put_questions(
            State(state.clone()),
            Path(id.clone()),
            Json(QuestionsRequest {
                questions: vec![question("q1")],
            }),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert!(state.store.get(&id).unwrap().questions.is_empty());

        loaded.set_section("Abstract", "<p>Edited.</p>");
        state.store.save(&loaded).unwrap();
        drop(spaces);

        let Json(stored) = task.await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);

        let project = state.store.get(&id).unwrap();
        assert_eq!(project.questions.len(), 1);
        assert_eq!(project.section("Abstract"), "<p>Edited.</p>");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_wins_over_in_flight_save() {
        let (state, id) = state_with_project();

        let spaces = lock(&state.workspaces);
        let mut loaded = state.store.get(&id).unwrap();

        let task = tokio::spawn(delete_project(State(state.clone()), Path(id.clone())));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert!(state.store.exists(&id).unwrap());

        loaded.set_section("Abstract", "<p>Late edit.</p>");
        state.store.save(&loaded).unwrap();
        drop(spaces);

        assert_eq!(task.await.unwrap().unwrap(), StatusCode::NO_CONTENT);
        assert!(!state.store.exists(&id).unwrap());
        assert!(!lock(&state.workspaces).contains_key(&id));

        let err = editor_view(State(state.clone()), Path(id.clone())).await;
        assert!(err.is_err());
        assert!(!lock(&state.workspaces).contains_key(&id));
    }
}
