use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::SandboxConfig;
use crate::error::{Result, ScriptboxError};

/// Everything a finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The deadline the run was killed at, if it overran. Output holds
    /// whatever the child wrote before that.
    pub timed_out: Option<Duration>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.timed_out.is_none() && self.exit_code == Some(0)
    }
}

/// Launches an entry point as a child process rooted at its workspace.
///
/// Output is collected in full and only handed back once the process exits
/// or is killed at the deadline.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    interpreter: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            timeout: config.timeout,
        }
    }

    pub fn with_interpreter(interpreter: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Run `entry_point` with the configured interpreter inside
    /// `working_dir`.
    ///
    /// Neither a non-zero exit nor an overrun is an error here; they are
    /// reported through [`RunOutcome::exit_code`] and
    /// [`RunOutcome::timed_out`]. An overrunning child is killed. Errors are
    /// reserved for failing to start or wait on the process.
    pub async fn run(&self, entry_point: &Path, working_dir: &Path) -> Result<RunOutcome> {
        tracing::debug!(
            interpreter = %self.interpreter.display(),
            entry_point = %entry_point.display(),
            "Launching entry point"
        );

        let mut child = Command::new(&self.interpreter)
            .arg(entry_point)
            .current_dir(working_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(interpreter = %self.interpreter.display(), error = %e, "Failed to spawn interpreter");
                ScriptboxError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to start interpreter {}: {}",
                        self.interpreter.display(),
                        e
                    ),
                ))
            })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let collect = async {
            tokio::try_join!(
                drain(stdout_pipe, &mut stdout),
                drain(stderr_pipe, &mut stderr)
            )?;
            child.wait().await
        };

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, collect)
                .await
                .map_err(|_| limit),
            None => Ok(collect.await),
        };

        let (status, timed_out) = match finished {
            Ok(status) => (Some(status?), None),
            Err(limit) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "Run exceeded deadline, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill overrunning process");
                }
                (None, Some(limit))
            }
        };

        Ok(RunOutcome {
            exit_code: status.and_then(|s| s.code()),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out,
        })
    }
}

/// Append everything `pipe` yields to `buf`. Each chunk lands in `buf` as
/// soon as it is read, so a cancelled drain keeps the partial output.
async fn drain<R>(pipe: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
