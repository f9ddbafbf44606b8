use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::ScriptboxError;
use crate::sandbox::SandboxBuilder;
use crate::scheduler::{ExecutionRequest, FailureKind, JobStatus};
use crate::worker::materializer::ArtifactStore;
use crate::worker::runner::ProcessRunner;

/// How a run ended. Exactly one of artifact or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { output_path: PathBuf },
    Failed { kind: FailureKind, error: String },
}

/// Result of one end-to-end run, before it is folded into the job record.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub job_id: Uuid,
    pub logs: Vec<String>,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn completed(job_id: Uuid, logs: Vec<String>, output_path: PathBuf) -> Self {
        Self {
            job_id,
            logs,
            outcome: Outcome::Completed { output_path },
        }
    }

    pub fn failed(job_id: Uuid, logs: Vec<String>, kind: FailureKind, error: String) -> Self {
        Self {
            job_id,
            logs,
            outcome: Outcome::Failed { kind, error },
        }
    }

    pub fn from_error(job_id: Uuid, logs: Vec<String>, error: &ScriptboxError) -> Self {
        Self::failed(job_id, logs, error.failure_kind(), error.to_string())
    }

    pub fn status(&self) -> JobStatus {
        match self.outcome {
            Outcome::Completed { .. } => JobStatus::Completed,
            Outcome::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Completed { output_path } => Some(output_path),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Completed { .. } => None,
            Outcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.outcome {
            Outcome::Completed { .. } => None,
            Outcome::Failed { kind, .. } => Some(kind),
        }
    }
}

/// Runs one job's pipeline: build the sandbox, run it, finalize the result.
///
/// The three steps always run in that order, and every failure along the
/// way becomes a failed [`ExecutionResult`] rather than an error.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    sandbox: SandboxBuilder,
    runner: ProcessRunner,
    artifacts: ArtifactStore,
}

impl ScriptExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sandbox: SandboxBuilder::new(&config.sandbox),
            runner: ProcessRunner::new(&config.sandbox),
            artifacts: ArtifactStore::new(config.artifact_dir.clone()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn sandbox(&self) -> &SandboxBuilder {
        &self.sandbox
    }

    pub async fn execute(&self, job_id: Uuid, request: &ExecutionRequest) -> ExecutionResult {
        tracing::info!(
            job_id = %job_id,
            inputs = request.input_files.len(),
            output = %request.output_filename,
            interpreter = %self.runner.interpreter().display(),
            "Executing job"
        );

        let mut logs = Vec::new();
        let prepared = match self
            .sandbox
            .prepare(
                &request.script,
                &request.input_files,
                &request.output_filename,
                &mut logs,
            )
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                logs.push(format!("ERROR: {e}"));
                return Self::report(ExecutionResult::from_error(job_id, logs, &e));
            }
        };

        let outcome = match self
            .runner
            .run(&prepared.entry_point, prepared.workspace.path())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                logs.push(format!("ERROR: {e}"));
                prepared.workspace.cleanup().await;
                return Self::report(ExecutionResult::from_error(job_id, logs, &e));
            }
        };
        let exit_code = outcome.exit_code;

        let result = self
            .artifacts
            .finalize(
                job_id,
                &prepared.workspace,
                &request.output_filename,
                outcome,
                logs,
            )
            .await;

        // workspace goes away here, before the result is published
        prepared.workspace.cleanup().await;

        tracing::debug!(job_id = %job_id, exit_code = ?exit_code, "Run finished");
        Self::report(result)
    }

    fn report(result: ExecutionResult) -> ExecutionResult {
        match &result.outcome {
            Outcome::Completed { output_path } => tracing::info!(
                job_id = %result.job_id,
                status = %result.status(),
                output = %output_path.display(),
                "Job completed"
            ),
            Outcome::Failed { kind, .. } => tracing::info!(
                job_id = %result.job_id,
                status = %result.status(),
                kind = %kind,
                "Job failed"
            ),
        }
        result
    }
}
