use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Result, ScriptboxError};

/// A scratch directory owned by exactly one run.
///
/// The directory exists for as long as this value does. [`cleanup`] removes
/// it off the async worker threads; if the value is dropped without that,
/// `Drop` removes the tree synchronously, whichever way the run ended.
///
/// [`cleanup`]: Workspace::cleanup
#[derive(Debug)]
pub struct Workspace {
    run_id: Uuid,
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `base`.
    ///
    /// The returned path is absolute even when `base` is relative, so paths
    /// under it stay valid for a child whose cwd is the workspace.
    pub async fn create(base: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base).await?;
        let base = tokio::fs::canonicalize(base).await?;

        let run_id = Uuid::new_v4();
        let path = base.join(format!("run-{run_id}"));
        // create_dir (not _all) so a name clash fails instead of sharing a directory
        tokio::fs::create_dir(&path).await.map_err(|e| {
            ScriptboxError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create workspace {}: {}", path.display(), e),
            ))
        })?;

        tracing::debug!(run_id = %run_id, path = %path.display(), "Created workspace");
        Ok(Self {
            run_id,
            path,
            removed: false,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Copy `source` into the workspace under its own basename.
    pub async fn copy_input(&self, source: &Path) -> Result<String> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ScriptboxError::InputMissing(source.to_path_buf()))?;

        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ScriptboxError::InputMissing(source.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScriptboxError::InputMissing(source.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        }

        let dest = self.path.join(&name);
        tokio::fs::copy(source, &dest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // removed between the metadata check and the copy
                ScriptboxError::InputMissing(source.to_path_buf())
            } else {
                ScriptboxError::Io(e)
            }
        })?;

        tracing::debug!(run_id = %self.run_id, file = %name, "Copied input");
        Ok(name)
    }

    pub async fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path.join(name);
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// Remove the directory tree without blocking the runtime.
    pub async fn cleanup(mut self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => tracing::debug!(run_id = %self.run_id, "Removed workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    run_id = %self.run_id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove workspace"
                );
                // leave the retry to Drop
                return;
            }
        }
        self.removed = true;
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(run_id = %self.run_id, "Removed workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                run_id = %self.run_id,
                path = %self.path.display(),
                error = %e,
                "Failed to remove workspace"
            ),
        }
    }
}
