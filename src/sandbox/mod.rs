//! Scratch workspace assembly for a single run.
//!
//! [`SandboxBuilder::prepare`] creates a fresh [`Workspace`], copies the
//! inputs in under their basenames and stages the generated entry point.
//! The returned [`PreparedSandbox`] owns the workspace; dropping it removes
//! everything that was staged.

pub mod entrypoint;
pub mod workspace;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::SandboxConfig;
use crate::error::{Result, ScriptboxError};

pub use entrypoint::{EntryPoint, ENTRYPOINT_FILE, ENTRYPOINT_VERSION, RESULT_VARIABLE};
pub use workspace::Workspace;

const MAX_OUTPUT_NAME_LEN: usize = 255;

/// A workspace ready to run.
#[derive(Debug)]
pub struct PreparedSandbox {
    pub workspace: Workspace,
    pub entry_point: PathBuf,
    pub input_files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SandboxBuilder {
    workspace_base: PathBuf,
}

impl SandboxBuilder {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            workspace_base: config.workspace_base.clone(),
        }
    }

    pub fn workspace_base(&self) -> &Path {
        &self.workspace_base
    }

    /// Build the workspace for one run. Setup diagnostics are appended to
    /// `logs` as they happen, so a failure part-way keeps what was done.
    pub async fn prepare(
        &self,
        snippet: &str,
        input_paths: &[PathBuf],
        output_name: &str,
        logs: &mut Vec<String>,
    ) -> Result<PreparedSandbox> {
        validate_output_name(output_name)?;

        let workspace = Workspace::create(&self.workspace_base).await?;
        logs.push(format!(
            "Created temporary directory: {}",
            workspace.path().display()
        ));

        let mut input_files = Vec::with_capacity(input_paths.len());
        let mut seen = HashSet::new();
        for path in input_paths {
            if let Some(name) = path.file_name() {
                let name = name.to_string_lossy().into_owned();
                if !seen.insert(name.clone()) {
                    return Err(ScriptboxError::DuplicateInput(name));
                }
            }
            let name = workspace.copy_input(path).await?;
            logs.push(format!("Copied input file: {name}"));
            input_files.push(name);
        }

        let script = EntryPoint::new(&input_files, output_name, snippet).render();
        let entry_point = workspace.write_file(ENTRYPOINT_FILE, &script).await?;
        logs.push("Script file created".to_string());

        Ok(PreparedSandbox {
            workspace,
            entry_point,
            input_files,
        })
    }
}

/// Output names end up verbatim in file names, both inside the workspace
/// and in the artifact store, so they are restricted to a plain basename.
pub fn validate_output_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| ScriptboxError::InvalidOutputName(format!("{name:?}: {reason}"));

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(invalid("too long"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if name == ENTRYPOINT_FILE {
        return Err(invalid("reserved name"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("only letters, digits, '.', '_' and '-' are allowed"));
    }
    Ok(())
}
