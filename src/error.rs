use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::FailureKind;

#[derive(Error, Debug)]
pub enum ScriptboxError {
    #[error("Input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Duplicate input file name: {0}")]
    DuplicateInput(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("output artifact was not produced")]
    NoResultProduced,

    #[error("execution exceeded the {}s deadline", .0.as_secs())]
    Timeout(Duration),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Result file not available for job {0}")]
    ArtifactUnavailable(Uuid),

    #[error("Invalid output file name: {0}")]
    InvalidOutputName(String),

    #[error("Job store is at capacity ({0} jobs still processing)")]
    StoreFull(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptboxError {
    /// Classification recorded on a failed job when this error ends a pipeline.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ScriptboxError::InputMissing(_) => FailureKind::InputMissing,
            ScriptboxError::ExecutionFailed(_) => FailureKind::ExecutionFailed,
            ScriptboxError::NoResultProduced => FailureKind::NoResultProduced,
            ScriptboxError::Timeout(_) => FailureKind::TimedOut,
            _ => FailureKind::Internal,
        }
    }

    /// Lookup failures are the only errors a query hands back synchronously.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScriptboxError::JobNotFound(_) | ScriptboxError::ArtifactUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScriptboxError>;
