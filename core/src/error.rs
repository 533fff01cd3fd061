//! Orchestrator error taxonomy
//!
//! One enum, one variant per policy bucket in the error handling design:
//! validation, authorization, contention, solvency, edit failure, build
//! failure, infrastructure, internal. The HTTP layer is the only place
//! that turns this into a status code + envelope; nothing else formats
//! a response from it.

use thiserror::Error;

/// Errors surfaced by the orchestrator state machine and its collaborators.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("prompt exceeds maximum length of {max} characters")]
    PromptTooLong { max: usize },

    #[error("prompt does not match any supported pattern: {0}")]
    UnsupportedPrompt(String),

    #[error("path is not editable: {0}")]
    InvalidPath(String),

    #[error("not authenticated")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("no matching edit pattern: {0}")]
    PatternNotFound(String),

    #[error("change exceeds size limits: {0}")]
    ChangeTooLarge(String),

    #[error("local verification failed: {0}")]
    LocalVerifyFailed(String),

    #[error("build failed after {attempts} attempt(s): {message}")]
    BuildFailed { attempts: u32, message: String },

    #[error("build runner unavailable: {0}")]
    RunnerUnavailable(String),

    #[error("build runner timed out after {0}s")]
    RunnerTimeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Collapses cross-tenant `Forbidden` into `NotFound` so existence of
    /// another principal's resource is never leaked.
    pub fn forbidden_as_not_found() -> Self {
        OrchestratorError::NotFound
    }

    /// Stable machine-readable code, independent of the Display message,
    /// for the HTTP error envelope and for client-side branching.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::EmptyPrompt => "EMPTY_PROMPT",
            OrchestratorError::PromptTooLong { .. } => "PROMPT_TOO_LONG",
            OrchestratorError::UnsupportedPrompt(_) => "UNSUPPORTED_PROMPT",
            OrchestratorError::InvalidPath(_) => "INVALID_PATH",
            OrchestratorError::Unauthorized => "UNAUTHORIZED",
            OrchestratorError::NotFound => "NOT_FOUND",
            OrchestratorError::RateLimited => "RATE_LIMIT_EXCEEDED",
            OrchestratorError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            OrchestratorError::PatternNotFound(_) => "PATTERN_NOT_FOUND",
            OrchestratorError::ChangeTooLarge(_) => "CHANGE_TOO_LARGE",
            OrchestratorError::LocalVerifyFailed(_) => "LOCAL_VERIFY_FAILED",
            OrchestratorError::BuildFailed { .. } => "BUILD_FAILED",
            OrchestratorError::RunnerUnavailable(_) => "RUNNER_UNAVAILABLE",
            OrchestratorError::RunnerTimeout(_) => "RUNNER_TIMEOUT",
            OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(e: sqlx::Error) -> Self {
        OrchestratorError::Internal(format!("store error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
