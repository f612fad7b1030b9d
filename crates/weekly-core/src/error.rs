//! Error types shared across the weekly digest system.

use thiserror::Error;

/// Errors surfaced by a `Repository` implementation.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("repository backend error: {0}")]
    Transient(String),

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl RepositoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Transient(_))
    }
}

/// Errors surfaced by an `EmailProvider` implementation.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("permanent provider error: {0}")]
    Permanent(String),

    #[error("recipient suppressed: {0}")]
    Suppressed(String),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transient(_))
    }
}

/// Errors surfaced by the Renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),
}

/// Top-level error type for the orchestrator's sweep-level failures.
#[derive(Error, Debug)]
pub enum WeeklyError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type WeeklyResult<T> = Result<T, WeeklyError>;
