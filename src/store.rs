//! Project persistence in sled.
//!
//! Projects live in the `projects` tree as JSON keyed by id. Survey responses
//! live in `responses` under `{project_id}/{response_id}` so one project's
//! responses are a prefix scan.

use sled::{Db, Tree};
use thiserror::Error;

use crate::models::{Project, SurveyResponse};

const PROJECTS_TREE: &str = "projects";
const RESPONSES_TREE: &str = "responses";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Db(#[from] sled::Error),
    #[error("Corrupt record: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ProjectStore {
    projects: Tree,
    responses: Tree,
}

impl ProjectStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory store that disappears on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let projects = db.open_tree(PROJECTS_TREE)?;
        let responses = db.open_tree(RESPONSES_TREE)?;
        Ok(Self {
            projects,
            responses,
        })
    }

    pub fn save(&self, project: &Project) -> Result<(), StoreError> {
        let json = serde_json::to_vec(project)?;
        self.projects.insert(project.id.as_bytes(), json)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Project, StoreError> {
        let bytes = self
            .projects
            .get(id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.projects.contains_key(id.as_bytes())?)
    }

    /// Load, mutate and write back a project.
    pub fn update<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Project) -> T,
    ) -> Result<T, StoreError> {
        let mut project = self.get(id)?;
        let out = f(&mut project);
        self.save(&project)?;
        Ok(out)
    }

    /// All projects, most recently modified first. Unreadable records are
    /// skipped.
    pub fn list(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = Vec::new();
        for entry in self.projects.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice::<Project>(&value) {
                Ok(p) => projects.push(p),
                Err(e) => tracing::warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping unreadable project"
                ),
            }
        }
        projects.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(projects)
    }

    /// Delete a project and its survey responses. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.projects.remove(id.as_bytes())?.is_some();
        for entry in self.responses.scan_prefix(response_prefix(id)) {
            let (key, _) = entry?;
            self.responses.remove(key)?;
        }
        Ok(existed)
    }

    pub fn add_response(&self, response: &SurveyResponse) -> Result<(), StoreError> {
        if !self.exists(&response.project_id)? {
            return Err(StoreError::NotFound(response.project_id.clone()));
        }
        let key = format!("{}{}", response_prefix(&response.project_id), response.id);
        self.responses.insert(key.as_bytes(), serde_json::to_vec(response)?)?;
        Ok(())
    }

    /// Responses for a project, oldest first.
    pub fn responses_for(&self, project_id: &str) -> Result<Vec<SurveyResponse>, StoreError> {
        let mut responses = Vec::new();
        for entry in self.responses.scan_prefix(response_prefix(project_id)) {
            let (_, value) = entry?;
            responses.push(serde_json::from_slice::<SurveyResponse>(&value)?);
        }
        responses.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(responses)
    }
}

fn response_prefix(project_id: &str) -> String {
    format!("{}/", project_id)
}
