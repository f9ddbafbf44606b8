use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, ScriptboxError};
use crate::scheduler::{ExecutionRequest, FailureKind, Job, JobStatus, JobStore};
use crate::worker::{ExecutionResult, ScriptExecutor};

/// Entry point for callers: submits jobs, answers status queries and hands
/// out finished artifacts.
///
/// Cloning is cheap; clones share the same job store and executor.
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<RwLock<JobStore>>,
    executor: Arc<ScriptExecutor>,
}

impl Engine {
    /// Build an engine and create its artifact and workspace directories.
    pub async fn new(config: EngineConfig) -> Result<Self> {
        let executor = ScriptExecutor::new(&config);
        executor.artifacts().ensure_dir().await?;
        tokio::fs::create_dir_all(executor.sandbox().workspace_base()).await?;

        tracing::info!(
            artifact_dir = %config.artifact_dir.display(),
            workspace_base = %config.sandbox.workspace_base.display(),
            max_jobs = config.max_jobs,
            timeout_secs = ?config.sandbox.timeout.map(|t| t.as_secs()),
            "Engine ready"
        );

        Ok(Self {
            store: Arc::new(RwLock::new(JobStore::with_capacity(config.max_jobs))),
            executor: Arc::new(executor),
        })
    }

    pub fn store(&self) -> Arc<RwLock<JobStore>> {
        self.store.clone()
    }

    /// Register a job as `processing` and start its pipeline in the
    /// background. Returns as soon as the record exists.
    ///
    /// # Errors
    ///
    /// Only request validation (`InvalidOutputName`, `DuplicateInput`) and
    /// a full store (`StoreFull`) fail here. Missing inputs surface later
    /// as a failed job.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<Uuid> {
        if let Err(e) = request.validate() {
            tracing::warn!(error = %e, "Rejected submission");
            return Err(e);
        }

        let job = Job::new(&request);
        let job_id = job.id;
        self.store.write().await.add_job(job)?;
        tracing::info!(
            job_id = %job_id,
            output = %request.output_filename,
            inputs = request.input_files.len(),
            "Job submitted"
        );

        let executor = self.executor.clone();
        self.spawn_pipeline(job_id, async move { executor.execute(job_id, &request).await });

        Ok(job_id)
    }

    /// Run `pipeline` on its own task and fold its result into the store.
    /// A panic inside it is caught at the task boundary and recorded as an
    /// `Internal` failure.
    fn spawn_pipeline<F>(&self, job_id: Uuid, pipeline: F)
    where
        F: Future<Output = ExecutionResult> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(pipeline).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Job worker task failed");
                    let message = format!("Job worker task failed: {e}");
                    ExecutionResult::failed(
                        job_id,
                        vec![message.clone()],
                        FailureKind::Internal,
                        message,
                    )
                }
            };

            if !store.write().await.finish(&job_id, result) {
                tracing::debug!(job_id = %job_id, "Job record gone before completion, result discarded");
            }
        });
    }

    /// Current record for `job_id`, which may still be processing.
    pub async fn get_status(&self, job_id: Uuid) -> Result<Job> {
        self.store
            .read()
            .await
            .get_job(&job_id)
            .cloned()
            .ok_or(ScriptboxError::JobNotFound(job_id))
    }

    /// Drop the record. A pipeline that is still running is left alone;
    /// its result is discarded when it finishes.
    pub async fn delete(&self, job_id: Uuid) -> Result<()> {
        match self.store.write().await.remove(&job_id) {
            Some(job) => {
                if !job.is_terminal() {
                    tracing::info!(job_id = %job_id, "Deleted job that is still processing");
                } else {
                    tracing::info!(job_id = %job_id, "Deleted job");
                }
                Ok(())
            }
            None => Err(ScriptboxError::JobNotFound(job_id)),
        }
    }

    pub async fn list_all(&self) -> Vec<Uuid> {
        self.store.read().await.job_ids()
    }

    /// Every record, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        self.store
            .read()
            .await
            .all_jobs()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Durable path of a completed job's artifact.
    pub async fn artifact(&self, job_id: Uuid) -> Result<PathBuf> {
        let job = self.get_status(job_id).await?;
        let path = match (job.status, job.output_path) {
            (JobStatus::Completed, Some(path)) => path,
            _ => return Err(ScriptboxError::ArtifactUnavailable(job_id)),
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(ScriptboxError::ArtifactUnavailable(job_id)),
        }
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, job_id: Uuid, poll: Duration) -> Result<Job> {
        loop {
            let job = self.get_status(job_id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Remove every finished record. Returns how many were dropped.
    pub async fn flush_finished(&self) -> usize {
        let removed = self.store.write().await.cleanup_finished_jobs();
        tracing::info!(removed, "Flushed finished jobs");
        removed
    }
}
