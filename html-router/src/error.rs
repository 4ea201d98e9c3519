use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use common::error::AppError;
use thiserror::Error;

/// Failures on the chat page, each mapped to a distinct user-facing message
/// so the page can tell "the index is empty" apart from "the model call
/// failed" and from a malformed submission.
#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("The policy index is not available yet. Ingest documents and try again.")]
    IndexUnavailable(String),

    #[error("The assistant could not process your question right now. Please try again.")]
    AssistantFailed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Something went wrong on our end.")]
    Internal(String),

    #[error("Failed to render the page.")]
    Render(#[from] minijinja::Error),
}

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::StoreUnavailable(detail) => Self::IndexUnavailable(detail),
            AppError::QueryFailed(detail) => Self::AssistantFailed(detail),
            AppError::Validation(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl HtmlError {
    fn status(&self) -> StatusCode {
        match self {
            Self::IndexUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AssistantFailed(_) | Self::Internal(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match &self {
            Self::IndexUnavailable(detail)
            | Self::AssistantFailed(detail)
            | Self::Internal(detail) => tracing::error!(%detail, "chat page error"),
            Self::Render(err) => tracing::error!(error = %err, "template rendering failed"),
            Self::BadRequest(_) => {}
        }

        let body = format!(
            "<!doctype html><html><body><p class=\"error\">{}</p>\
             <p><a href=\"/chat\">Back to chat</a></p></body></html>",
            self
        );
        (self.status(), Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classes_get_distinct_messages() {
        let unavailable = HtmlError::from(AppError::StoreUnavailable("empty".into()));
        let failed = HtmlError::from(AppError::QueryFailed("timeout".into()));
        let internal = HtmlError::from(AppError::InternalError("boom".into()));

        assert_ne!(unavailable.to_string(), failed.to_string());
        assert_ne!(failed.to_string(), internal.to_string());
        assert!(unavailable.to_string().contains("index"));
    }

    #[test]
    fn statuses_follow_the_failure_class() {
        let err = HtmlError::from(AppError::StoreUnavailable("empty".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = HtmlError::from(AppError::Validation("message required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = HtmlError::from(AppError::QueryFailed("timeout".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
