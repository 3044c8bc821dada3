//! Error type returned by HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::assistant::AssistantError;
use crate::editor::EditorError;
use crate::import::ImportError;
use crate::sections::SectionError;
use crate::store::StoreError;
use crate::survey::SurveyError;
use crate::workflow::WorkflowError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::not_found(e.to_string()),
            other => {
                error!(error = %other, "Store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<SectionError> for ApiError {
    fn from(e: SectionError) -> Self {
        match e {
            SectionError::NotFound(_) => Self::not_found(e.to_string()),
            SectionError::Duplicate(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            SectionError::EmptyName => Self::bad_request(e.to_string()),
        }
    }
}

impl From<EditorError> for ApiError {
    fn from(e: EditorError) -> Self {
        Self::new(StatusCode::CONFLICT, e.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::IllegalTransition { .. } | WorkflowError::ModalClosed => {
                Self::new(StatusCode::CONFLICT, e.to_string())
            }
            WorkflowError::MissingConfig | WorkflowError::EmptyTopic => {
                Self::bad_request(e.to_string())
            }
        }
    }
}

impl From<SurveyError> for ApiError {
    fn from(e: SurveyError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        warn!(error = %e, "Assistant call failed");
        match e {
            AssistantError::Unavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            _ => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Assistant(inner) => inner.into(),
            other => Self::bad_request(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(StoreError::NotFound("x".into())).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(SectionError::Duplicate("Abstract".into())).status,
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::from(EditorError::NotBound).status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(SurveyError::Incomplete).message,
            "Please answer all questions before submitting."
        );
        assert_eq!(
            ApiError::from(ImportError::Assistant(AssistantError::Unavailable("k".into()))).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError::from(ImportError::Empty).status, StatusCode::BAD_REQUEST);
    }
}
