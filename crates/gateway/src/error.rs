use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use types::{RuntimeError, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Endpoint-specific code reported for unexpected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Processing,
    Feedback,
    SessionEnd,
    Transfer,
    Stats,
}

impl FailureKind {
    pub fn error_code(self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING_ERROR",
            Self::Feedback => "FEEDBACK_ERROR",
            Self::SessionEnd => "SESSION_END_ERROR",
            Self::Transfer => "TRANSFER_ERROR",
            Self::Stats => "STATS_ERROR",
        }
    }

    fn user_message(self) -> &'static str {
        match self {
            Self::Processing => {
                "I'm having trouble processing your request right now. Please try again in a moment."
            }
            Self::Feedback => "An error occurred while saving your feedback",
            Self::SessionEnd => "An error occurred while ending the session",
            Self::Transfer => "An error occurred while requesting human assistance",
            Self::Stats => "Unable to retrieve session statistics at this time.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
            details: None,
        }
    }

    pub fn session_not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", message)
    }

    pub fn feedback_target_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "FEEDBACK_TARGET_NOT_FOUND",
            "Session or turn not found",
        )
    }

    pub fn validation(error: &ValidationError) -> Self {
        match error {
            ValidationError::EmptyInput => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "EMPTY_INPUT",
                "Please enter a message to continue our conversation.",
            ),
            ValidationError::MessageTooLong { max_chars, .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "MESSAGE_TOO_LONG",
                format!("Your message is too long. Please keep it under {max_chars} characters."),
            ),
            ValidationError::InvalidInput { message } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_INPUT",
                "The request could not be processed.",
            )
            .with_details(message.clone()),
        }
    }

    /// Maps a runtime failure for the endpoint `kind`. Internal details are
    /// logged here and never returned to the caller.
    pub fn from_runtime(kind: FailureKind, error: RuntimeError) -> Self {
        match error {
            RuntimeError::Validation(error) => Self::validation(&error),
            RuntimeError::SessionNotFound { .. } => Self::session_not_found("Session not found"),
            other => {
                tracing::error!(error_code = kind.error_code(), "request failed: {other}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    kind.error_code(),
                    kind.user_message(),
                )
            }
        }
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_INPUT",
            "The request body is not valid.",
        )
        .with_details(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error_code: self.error_code.to_owned(),
            message: self.message,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}
