use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScriptboxError};
use crate::sandbox;
use crate::worker::executor::{ExecutionResult, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InputMissing,
    ExecutionFailed,
    NoResultProduced,
    TimedOut,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::InputMissing => write!(f, "input_missing"),
            FailureKind::ExecutionFailed => write!(f, "execution_failed"),
            FailureKind::NoResultProduced => write!(f, "no_result_produced"),
            FailureKind::TimedOut => write!(f, "timed_out"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

/// What a caller submits: the snippet, the inputs it reads, and the name
/// it wants the result saved under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub script: String,
    pub input_files: Vec<PathBuf>,
    pub output_filename: String,
}

impl ExecutionRequest {
    pub fn new(
        script: impl Into<String>,
        input_files: Vec<PathBuf>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            script: script.into(),
            input_files,
            output_filename: output_filename.into(),
        }
    }

    /// Checks that can be made without touching the filesystem. Input
    /// existence is deliberately left to the pipeline.
    pub fn validate(&self) -> Result<()> {
        sandbox::validate_output_name(&self.output_filename)?;

        let mut seen = HashSet::new();
        for path in &self.input_files {
            if let Some(name) = path.file_name() {
                let name = name.to_string_lossy().into_owned();
                if !seen.insert(name.clone()) {
                    return Err(ScriptboxError::DuplicateInput(name));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub output_filename: String,
    pub input_files: Vec<PathBuf>,
    pub logs: Vec<String>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh record, already `processing`; there is no pending state.
    pub fn new(request: &ExecutionRequest) -> Self {
        Self::with_id(Uuid::new_v4(), request)
    }

    pub fn with_id(id: Uuid, request: &ExecutionRequest) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            output_filename: request.output_filename.clone(),
            input_files: request.input_files.clone(),
            logs: Vec::new(),
            output_path: None,
            error: None,
            error_kind: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold a pipeline result into this record. Exactly one of
    /// `output_path` / `error` ends up set.
    pub(crate) fn apply(&mut self, result: ExecutionResult) {
        self.logs = result.logs;
        match result.outcome {
            Outcome::Completed { output_path } => {
                self.status = JobStatus::Completed;
                self.output_path = Some(output_path);
                self.error = None;
                self.error_kind = None;
            }
            Outcome::Failed { kind, error } => {
                self.status = JobStatus::Failed;
                self.output_path = None;
                self.error = Some(error);
                self.error_kind = Some(kind);
            }
        }
        self.completed_at = Some(Utc::now());
    }
}
