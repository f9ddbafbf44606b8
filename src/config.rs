use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_JOBS: usize = 10_000;

/// Configuration for running snippets in scratch workspaces.
///
/// Isolation is per-directory and per-process: every run gets its own
/// workspace under `workspace_base` and its own interpreter process.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter used to launch the generated entry point
    pub interpreter: PathBuf,
    /// Parent directory for per-run scratch workspaces
    pub workspace_base: PathBuf,
    /// Wall-clock limit for one run. `None` lets a run block indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            workspace_base: std::env::temp_dir().join("scriptbox-workspaces"),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

impl SandboxConfig {
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_workspace_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.workspace_base = base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for the job engine: sandbox settings, where finished
/// artifacts are kept, and how many job records are retained.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sandbox: SandboxConfig,
    /// Flat directory holding one artifact per completed job
    pub artifact_dir: PathBuf,
    /// Upper bound on retained job records
    pub max_jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            artifact_dir: PathBuf::from("outputs"),
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

impl EngineConfig {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            engine: EngineConfig::default(),
        }
    }
}
