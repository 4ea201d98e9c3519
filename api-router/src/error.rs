use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::ValidationError(msg),
            // Every other failure surfaces as a single 500 with a
            // human-readable detail; no partial results, nothing retried.
            other => {
                tracing::error!("request failed: {other}");
                Self::InternalError(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Self::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
            Self::ValidationError(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    status: "error".to_string(),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_status_code<T: IntoResponse + Debug>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let validation = AppError::Validation("chunk_size out of bounds".to_string());
        let api_error = ApiError::from(validation);
        assert!(
            matches!(api_error, ApiError::ValidationError(msg) if msg == "chunk_size out of bounds")
        );

        let source = AppError::SourceNotFound("'./missing' does not exist".to_string());
        let api_error = ApiError::from(source);
        assert!(matches!(api_error, ApiError::InternalError(_)));

        let store = AppError::StoreUnavailable("no nodes indexed".to_string());
        let api_error = ApiError::from(store);
        assert!(matches!(api_error, ApiError::InternalError(_)));

        let query = AppError::QueryFailed("llm timeout".to_string());
        let api_error = ApiError::from(query);
        assert!(matches!(api_error, ApiError::InternalError(msg) if msg.contains("llm timeout")));
    }

    #[test]
    fn test_api_error_response_status_codes() {
        let error = ApiError::InternalError("ingestion failed".to_string());
        assert_status_code(error, StatusCode::INTERNAL_SERVER_ERROR);

        let error = ApiError::ValidationError("query must not be empty".to_string());
        assert_status_code(error, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_keeps_its_detail() {
        let api_error = ApiError::from(AppError::IngestionFailed("extractor failed".to_string()));
        assert!(api_error.to_string().contains("extractor failed"));
    }
}
