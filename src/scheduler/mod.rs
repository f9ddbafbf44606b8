//! Job lifecycle bookkeeping: the job record and the store that owns it.

pub mod job;
pub mod store;

pub use job::{ExecutionRequest, FailureKind, Job, JobStatus};
pub use store::JobStore;
