//! Application flow: which screen the user is on and what they have chosen
//! so far.
//!
//! `Flow::apply` is the only way to change it. An action that makes no sense
//! on the current screen is rejected and the flow is left as it was.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CitationStyle, Methodology, Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Landing,
    Config,
    TopicArchitect,
    ProjectLibrary,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfig {
    pub citation_style: CitationStyle,
    pub methodology: Methodology,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Flow {
    pub step: Step,
    pub modal_open: bool,
    pub pending_config: Option<PendingConfig>,
    pub current_project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    OpenModal,
    CloseModal,
    StartFresh,
    Configure {
        citation_style: CitationStyle,
        methodology: Methodology,
    },
    FinalizeTopic {
        topic: String,
        #[serde(default)]
        theme: String,
    },
    Imported {
        project_id: String,
    },
    Select {
        project_id: String,
    },
    BackToLibrary,
    Deleted {
        project_id: String,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::OpenModal => "open the new project dialog",
            Action::CloseModal => "close the new project dialog",
            Action::StartFresh => "start a fresh project",
            Action::Configure { .. } => "configure the project",
            Action::FinalizeTopic { .. } => "finalize the topic",
            Action::Imported { .. } => "finish an import",
            Action::Select { .. } => "open a project",
            Action::BackToLibrary => "return to the library",
            Action::Deleted { .. } => "delete a project",
        }
    }
}

/// Work the caller must carry out after a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    None,
    CreateProject(Project),
}

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Cannot {action} from the {step:?} step")]
    IllegalTransition { action: &'static str, step: Step },
    #[error("The new project dialog is not open")]
    ModalClosed,
    #[error("Choose a citation style and methodology first")]
    MissingConfig,
    #[error("A research topic is required")]
    EmptyTopic,
}

impl Flow {
    fn require(&self, action: &Action, allowed: &[Step]) -> Result<(), WorkflowError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(WorkflowError::IllegalTransition {
                action: action.name(),
                step: self.step,
            })
        }
    }

    pub fn apply(&mut self, action: Action) -> Result<Effect, WorkflowError> {
        match &action {
            Action::OpenModal => {
                self.require(&action, &[Step::Landing, Step::ProjectLibrary])?;
                self.modal_open = true;
            }
            Action::CloseModal => {
                self.modal_open = false;
            }
            Action::StartFresh => {
                if !self.modal_open {
                    return Err(WorkflowError::ModalClosed);
                }
                self.modal_open = false;
                self.pending_config = None;
                self.step = Step::Config;
            }
            Action::Configure {
                citation_style,
                methodology,
            } => {
                self.require(&action, &[Step::Config])?;
                self.pending_config = Some(PendingConfig {
                    citation_style: *citation_style,
                    methodology: *methodology,
                });
                self.step = Step::TopicArchitect;
            }
            Action::FinalizeTopic { topic, theme } => {
                self.require(&action, &[Step::TopicArchitect])?;
                let config = self.pending_config.ok_or(WorkflowError::MissingConfig)?;
                if topic.trim().is_empty() {
                    return Err(WorkflowError::EmptyTopic);
                }
                let project =
                    Project::new(topic, theme, config.citation_style, config.methodology);
                self.pending_config = None;
                self.step = Step::ProjectLibrary;
                return Ok(Effect::CreateProject(project));
            }
            Action::Imported { .. } => {
                if !self.modal_open {
                    return Err(WorkflowError::ModalClosed);
                }
                self.modal_open = false;
                self.step = Step::ProjectLibrary;
            }
            Action::Select { project_id } => {
                self.require(&action, &[Step::ProjectLibrary, Step::Dashboard])?;
                self.current_project = Some(project_id.clone());
                self.modal_open = false;
                self.step = Step::Dashboard;
            }
            Action::BackToLibrary => {
                self.require(&action, &[Step::Dashboard])?;
                self.step = Step::ProjectLibrary;
            }
            Action::Deleted { project_id } => {
                if self.current_project.as_deref() == Some(project_id.as_str()) {
                    self.current_project = None;
                    if self.step == Step::Dashboard {
                        self.step = Step::ProjectLibrary;
                    }
                }
            }
        }
        Ok(Effect::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configure() -> Action {
        Action::Configure {
            citation_style: CitationStyle::Ieee,
            methodology: Methodology::Quantitative,
        }
    }

    #[test]
    fn test_full_creation_flow() {
        let mut flow = Flow::default();
        flow.apply(Action::OpenModal).unwrap();
        assert!(flow.modal_open);
        flow.apply(Action::StartFresh).unwrap();
        assert_eq!(flow.step, Step::Config);
        assert!(!flow.modal_open);
        flow.apply(configure()).unwrap();
        assert_eq!(flow.step, Step::TopicArchitect);

        let effect = flow
            .apply(Action::FinalizeTopic {
                topic: "Quantum Algorithms for Logistics".to_string(),
                theme: "quantum".to_string(),
            })
            .unwrap();
        let Effect::CreateProject(project) = effect else {
            panic!("expected a project");
        };
        assert_eq!(project.title, "Quantum Algorithms for Logistics");
        assert_eq!(project.theme, "quantum");
        assert_eq!(project.citation_style, CitationStyle::Ieee);
        assert_eq!(project.methodology, Methodology::Quantitative);
        assert_eq!(flow.step, Step::ProjectLibrary);
        assert_eq!(flow.pending_config, None);

        flow.apply(Action::Select { project_id: project.id.clone() }).unwrap();
        assert_eq!(flow.step, Step::Dashboard);
        assert_eq!(flow.current_project.as_deref(), Some(project.id.as_str()));

        flow.apply(Action::BackToLibrary).unwrap();
        assert_eq!(flow.step, Step::ProjectLibrary);
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let mut flow = Flow::default();
        let before = flow.clone();
        let err = flow.apply(configure()).unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { step: Step::Landing, .. }));
        assert_eq!(flow, before);

        assert_eq!(flow.apply(Action::StartFresh).unwrap_err(), WorkflowError::ModalClosed);
        assert_eq!(flow, before);
    }

    #[test]
    fn test_finalize_rejects_empty_topic() {
        let mut flow = Flow::default();
        flow.apply(Action::OpenModal).unwrap();
        flow.apply(Action::StartFresh).unwrap();
        flow.apply(configure()).unwrap();
        let before = flow.clone();
        let err = flow
            .apply(Action::FinalizeTopic { topic: "   ".to_string(), theme: String::new() })
            .unwrap_err();
        assert_eq!(err, WorkflowError::EmptyTopic);
        assert_eq!(flow, before);
    }

    #[test]
    fn test_import_closes_modal_into_library() {
        let mut flow = Flow::default();
        flow.apply(Action::OpenModal).unwrap();
        flow.apply(Action::Imported { project_id: "abc".to_string() }).unwrap();
        assert_eq!(flow.step, Step::ProjectLibrary);
        assert!(!flow.modal_open);
    }

    #[test]
    fn test_deleting_open_project_returns_to_library() {
        let mut flow = Flow {
            step: Step::Dashboard,
            current_project: Some("p1".to_string()),
            ..Flow::default()
        };
        flow.apply(Action::Deleted { project_id: "other".to_string() }).unwrap();
        assert_eq!(flow.step, Step::Dashboard);
        flow.apply(Action::Deleted { project_id: "p1".to_string() }).unwrap();
        assert_eq!(flow.step, Step::ProjectLibrary);
        assert_eq!(flow.current_project, None);
    }

    #[test]
    fn test_action_deserialization() {
        let action: Action = serde_json::from_str(
            r#"{"action":"configure","citation_style":"MLA","methodology":"Qualitative"}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Configure {
                citation_style: CitationStyle::Mla,
                methodology: Methodology::Qualitative
            }
        );
        let action: Action = serde_json::from_str(r#"{"action":"back_to_library"}"#).unwrap();
        assert_eq!(action, Action::BackToLibrary);
    }
}
