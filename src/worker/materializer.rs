use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Result, ScriptboxError};
use crate::sandbox::Workspace;
use crate::worker::executor::ExecutionResult;
use crate::worker::runner::RunOutcome;

/// Flat directory of finished artifacts, one file per completed job.
///
/// Files are named `<job id>_<output name>` and written once; nothing here
/// ever rewrites or removes an artifact.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn artifact_path(&self, job_id: Uuid, output_name: &str) -> PathBuf {
        self.dir.join(format!("{job_id}_{output_name}"))
    }

    /// Turn a finished run into an [`ExecutionResult`].
    ///
    /// Appends the captured stdout lines, then stderr lines tagged `ERROR:`,
    /// then any relocation diagnostics to `logs`. An overrun run keeps the
    /// output it produced and fails as timed out.
    pub async fn finalize(
        &self,
        job_id: Uuid,
        workspace: &Workspace,
        output_name: &str,
        outcome: RunOutcome,
        mut logs: Vec<String>,
    ) -> ExecutionResult {
        let stdout = outcome.stdout.trim();
        if !stdout.is_empty() {
            logs.extend(stdout.lines().map(str::to_string));
        }
        let stderr = outcome.stderr.trim();
        if !stderr.is_empty() {
            logs.extend(stderr.lines().map(|line| format!("ERROR: {line}")));
        }

        if let Some(limit) = outcome.timed_out {
            let e = ScriptboxError::Timeout(limit);
            logs.push(format!("ERROR: {e}"));
            return ExecutionResult::from_error(job_id, logs, &e);
        }

        if !outcome.success() {
            let error = if outcome.stderr.trim().is_empty() {
                match outcome.exit_code {
                    Some(code) => format!("Exit code: {code}"),
                    None => "Process terminated by signal".to_string(),
                }
            } else {
                outcome.stderr
            };
            return ExecutionResult::from_error(job_id, logs, &ScriptboxError::ExecutionFailed(error));
        }

        let produced = workspace.join(output_name);
        match tokio::fs::metadata(&produced).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                return ExecutionResult::from_error(job_id, logs, &ScriptboxError::NoResultProduced)
            }
        }

        let dest = self.artifact_path(job_id, output_name);
        match self.store(&produced, &dest).await {
            Ok(()) => {
                logs.push(format!("Output file created: {}", dest.display()));
                ExecutionResult::completed(job_id, logs, dest)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, dest = %dest.display(), error = %e, "Failed to store artifact");
                logs.push(format!("Failed to store output file: {e}"));
                ExecutionResult::from_error(job_id, logs, &e)
            }
        }
    }

    async fn store(&self, source: &Path, dest: &Path) -> Result<()> {
        self.ensure_dir().await?;
        let mut src = tokio::fs::File::open(source).await?;
        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await?;
        tokio::io::copy(&mut src, &mut out).await?;
        out.flush().await?;
        Ok(())
    }
}
