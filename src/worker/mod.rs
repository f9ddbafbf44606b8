//! Execution of a single job.
//!
//! # Components
//!
//! - [`ProcessRunner`]: launches the entry point and captures its output
//! - [`ArtifactStore`]: relocates the produced file and assembles the result
//! - [`ScriptExecutor`]: runs sandbox build, process and finalize in order
//!
//! # Execution Flow
//!
//! 1. [`SandboxBuilder::prepare`](crate::sandbox::SandboxBuilder::prepare)
//!    stages inputs and the entry point in a fresh workspace
//! 2. [`ProcessRunner::run`] executes `<interpreter> <entry point>` there
//! 3. [`ArtifactStore::finalize`] checks the exit status and the output
//!    file, then copies the artifact out under a job-qualified name
//! 4. The workspace is dropped and removed
//!
//! # Security Note
//!
//! Isolation is a separate directory and a separate process. There are no
//! resource quotas, filesystem jail or network restrictions.

pub mod executor;
pub mod materializer;
pub mod runner;

pub use executor::{ExecutionResult, Outcome, ScriptExecutor};
pub use materializer::ArtifactStore;
pub use runner::{ProcessRunner, RunOutcome};
