//! Translates `OrchestratorError` into the `{"error": {code, message,
//! details?}}` envelope and HTTP status per the error handling design.
//! No other layer formats an HTTP response from it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator_core::OrchestratorError;
use serde_json::json;

pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::EmptyPrompt
            | OrchestratorError::PromptTooLong { .. }
            | OrchestratorError::UnsupportedPrompt(_)
            | OrchestratorError::InvalidPath(_)
            | OrchestratorError::InsufficientCredits { .. }
            | OrchestratorError::PatternNotFound(_)
            | OrchestratorError::ChangeTooLarge(_)
            | OrchestratorError::LocalVerifyFailed(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::Unauthorized => StatusCode::UNAUTHORIZED,
            OrchestratorError::NotFound => StatusCode::NOT_FOUND,
            OrchestratorError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::BuildFailed { .. }
            | OrchestratorError::RunnerUnavailable(_)
            | OrchestratorError::RunnerTimeout(_) => StatusCode::OK,
            OrchestratorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if matches!(self.0, OrchestratorError::Internal(_)) {
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": self.0.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
