//! Application error types.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_core::chat::{ChatError, FieldViolation, ValidationErrors};
use parley_core::completion::CompletionError;
use thiserror::Error;
use tracing::error;

use crate::models::{ErrorResponse, ValidationErrorResponse};

/// Message returned for every failure that is not the client's fault.
pub const INTERNAL_ERROR_MESSAGE: &str = "Failed to process chat request";

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrorResponse {
                    error: errors.into_violations(),
                }),
            )
                .into_response(),
            // Provider details stay in the log.
            AppError::Completion(e) => {
                error!(error = %e, "chat request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: INTERNAL_ERROR_MESSAGE.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(errors) => AppError::Validation(errors),
            ChatError::Provider(e) => AppError::Completion(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(FieldViolation::invalid_body(rejection.body_text()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::chat::ViolationCode;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::from(ValidationErrors(vec![FieldViolation::new(
            ViolationCode::Missing,
            "prompt",
            "Prompt is required",
        )]));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn completion_maps_to_internal_error() {
        let err = AppError::from(ChatError::Provider(CompletionError::Transport(
            "connection reset".into(),
        )));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
