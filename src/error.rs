//! Error types for Resen

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResenError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Bucket '{0}' does not have an image assigned to it")]
    MissingImage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to start: {0}")]
    StartFailure(String),

    #[error("Failed to stop: {0}")]
    StopFailure(String),

    #[error("Failed to remove: {0}")]
    RemovalFailure(String),

    #[error("Container runtime error: {0}")]
    Adapter(String),

    #[error("Another instance of resen is already running (lock file {})", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`ResenError`], for callers that branch on
/// the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    Validation,
    AdapterFailure,
    AlreadyRunning,
    Io,
}

impl ResenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResenError::NotFound(_) => ErrorKind::NotFound,
            ResenError::Conflict(_) => ErrorKind::Conflict,
            ResenError::InvalidState(_) | ResenError::MissingImage(_) => ErrorKind::InvalidState,
            ResenError::Validation(_) => ErrorKind::Validation,
            ResenError::StartFailure(_)
            | ResenError::StopFailure(_)
            | ResenError::RemovalFailure(_)
            | ResenError::Adapter(_) => ErrorKind::AdapterFailure,
            ResenError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            ResenError::Io(_) | ResenError::Json(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn no_bucket(name: &str) -> Self {
        ResenError::NotFound(format!("Bucket with name '{}' does not exist", name))
    }
}

pub type Result<T> = std::result::Result<T, ResenError>;
