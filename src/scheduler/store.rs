use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Result, ScriptboxError};
use crate::scheduler::job::{Job, JobStatus};
use crate::worker::executor::ExecutionResult;

const DEFAULT_MAX_JOBS: usize = 10_000;

/// In-memory registry of job records.
///
/// Created once per engine and shared behind a lock; every operation is a
/// short map access and never waits on a running pipeline.
#[derive(Debug)]
pub struct JobStore {
    jobs: HashMap<Uuid, Job>,
    max_jobs: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            max_jobs: max_jobs.max(1),
        }
    }

    /// Insert a new record. At capacity the oldest finished job is evicted
    /// to make room; if every retained job is still processing the insert
    /// is refused.
    pub fn add_job(&mut self, job: Job) -> Result<()> {
        if self.jobs.len() >= self.max_jobs {
            match self.oldest_finished() {
                Some(evicted) => {
                    self.jobs.remove(&evicted);
                    tracing::debug!(job_id = %evicted, "Evicted finished job to make room");
                }
                None => return Err(ScriptboxError::StoreFull(self.jobs.len())),
            }
        }
        self.jobs.insert(job.id, job);
        Ok(())
    }

    /// Get a job by ID
    pub fn get_job(&self, id: &Uuid) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Move a job from `processing` to its terminal state.
    ///
    /// Returns false when the record is gone (deleted while running) or
    /// already terminal; in both cases nothing is changed.
    pub fn finish(&mut self, id: &Uuid, result: ExecutionResult) -> bool {
        match self.jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Processing => {
                job.apply(result);
                true
            }
            Some(job) => {
                tracing::warn!(job_id = %id, status = %job.status, "Ignoring result for finished job");
                false
            }
            None => false,
        }
    }

    /// Remove a record, returning it if it existed.
    pub fn remove(&mut self, id: &Uuid) -> Option<Job> {
        self.jobs.remove(id)
    }

    /// Every job ID, in no particular order
    pub fn job_ids(&self) -> Vec<Uuid> {
        self.jobs.keys().copied().collect()
    }

    /// Get all jobs sorted chronologically by creation time
    pub fn all_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Jobs whose pipeline has not reported back yet
    pub fn processing_jobs(&self) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .collect()
    }

    /// Remove completed and failed jobs. Returns the number of jobs removed.
    pub fn cleanup_finished_jobs(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.is_terminal());
        before - self.jobs.len()
    }

    fn oldest_finished(&self) -> Option<Uuid> {
        self.jobs
            .values()
            .filter(|j| j.is_terminal())
            .min_by_key(|j| j.created_at)
            .map(|j| j.id)
    }

    /// Returns the current number of jobs in the store
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if the store is empty
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_jobs
    }
}
