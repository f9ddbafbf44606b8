
use std::path::PathBuf;
use std::time::Duration;

use scriptbox::config::SandboxConfig;
use scriptbox::sandbox::{SandboxBuilder, Workspace, ENTRYPOINT_FILE};
use scriptbox::scheduler::{ExecutionRequest, FailureKind, JobStatus};
use scriptbox::worker::{ArtifactStore, ProcessRunner, RunOutcome, ScriptExecutor};
use scriptbox::ScriptboxError;
use test_harness::TestEnv;
use uuid::Uuid;

/// Runner using `sh` so these tests do not depend on Python.
fn shell_runner(timeout: Option<Duration>) -> ProcessRunner {
    ProcessRunner::with_interpreter("sh", timeout)
}

async fn shell_script(workspace: &Workspace, body: &str) -> PathBuf {
    workspace.write_file("run.sh", body).await.unwrap()
}

fn outcome(exit_code: Option<i32>, stdout: &str, stderr: &str) -> RunOutcome {
    RunOutcome {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        timed_out: None,
    }
}

/// Workspace base given relative to the crate root, which is the cwd of
/// integration tests.
struct RelativeBase(PathBuf);

impl RelativeBase {
    fn new() -> Self {
        Self(PathBuf::from("target").join(format!("scriptbox-ws-{}", Uuid::new_v4())))
    }
}

impl Drop for RelativeBase {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

// ---------------------------------------------------------------------------
// Process runner
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_captures_stdout() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "echo hello\necho world\n").await;

    let result = shell_runner(None)
        .run(&script, workspace.path())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout, "hello\nworld\n");
    assert!(result.stderr.is_empty());
}

#[tokio::test]
async fn test_run_reports_nonzero_exit_with_stderr() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "echo 'error message' >&2\nexit 3\n").await;

    let result = shell_runner(None)
        .run(&script, workspace.path())
        .await
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.exit_code, Some(3));
    assert!(result.stderr.contains("error message"));
}

#[tokio::test]
async fn test_run_uses_workspace_as_cwd() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "echo data > relative.txt\n").await;

    let result = shell_runner(None)
        .run(&script, workspace.path())
        .await
        .unwrap();

    assert!(result.success());
    assert!(workspace.join("relative.txt").exists());
}

#[tokio::test]
async fn test_run_large_output() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "seq 1 1000\n").await;

    let result = shell_runner(None)
        .run(&script, workspace.path())
        .await
        .unwrap();

    assert_eq!(result.stdout.lines().count(), 1000);
}

#[tokio::test]
async fn test_run_times_out_keeping_partial_output() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "echo started\necho warming >&2\nexec sleep 30\n").await;

    let start = std::time::Instant::now();
    let result = shell_runner(Some(Duration::from_millis(500)))
        .run(&script, workspace.path())
        .await
        .unwrap();

    assert_eq!(result.timed_out, Some(Duration::from_millis(500)));
    assert!(!result.success());
    assert_eq!(result.stdout, "started\n");
    assert_eq!(result.stderr, "warming\n");
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_run_missing_interpreter() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let script = shell_script(&workspace, "true\n").await;

    let err = ProcessRunner::with_interpreter("nonexistent_interpreter_12345", None)
        .run(&script, workspace.path())
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptboxError::Io(_)));
    assert_eq!(err.failure_kind(), FailureKind::Internal);
}

// ---------------------------------------------------------------------------
// Sandbox builder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_workspace_removed_on_drop() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let path = workspace.path().to_path_buf();
    workspace.write_file("scratch.txt", "x").await.unwrap();
    assert!(path.exists());

    drop(workspace);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_workspace_cleanup_removes_directory() {
    let env = TestEnv::new();
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    let path = workspace.path().to_path_buf();
    workspace.write_file("scratch.txt", "x").await.unwrap();

    workspace.cleanup().await;
    assert!(!path.exists());
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_relative_workspace_base_runs_entry_point() {
    let env = TestEnv::new();
    let base = RelativeBase::new();
    assert!(base.0.is_relative());
    let input = env.write_csv("a.csv", "x\n1\n");
    let builder = SandboxBuilder::new(&SandboxConfig::default().with_workspace_base(base.0.clone()));

    let mut logs = Vec::new();
    let prepared = builder
        .prepare("pass", &[input], "out.csv", &mut logs)
        .await
        .unwrap();
    assert!(prepared.entry_point.is_absolute());

    let result = ProcessRunner::with_interpreter("cat", None)
        .run(&prepared.entry_point, prepared.workspace.path())
        .await
        .unwrap();

    assert_eq!(result.exit_code, Some(0), "stderr: {}", result.stderr);
    assert!(result.stdout.starts_with("# scriptbox entry point v1"));
    prepared.workspace.cleanup().await;
}

#[tokio::test]
async fn test_workspaces_are_unique() {
    let env = TestEnv::new();
    let a = Workspace::create(&env.workspace_base()).await.unwrap();
    let b = Workspace::create(&env.workspace_base()).await.unwrap();
    assert_ne!(a.path(), b.path());
    assert_ne!(a.run_id(), b.run_id());
}

#[tokio::test]
async fn test_prepare_stages_inputs_and_entry_point() {
    let env = TestEnv::new();
    let a = env.write_csv("a.csv", "x\n1\n");
    let b = env.write_csv("b.csv", "y\n2\n");
    let builder =
        SandboxBuilder::new(&SandboxConfig::default().with_workspace_base(env.workspace_base()));

    let mut logs = Vec::new();
    let prepared = builder
        .prepare("result = dataframes['a.csv']", &[a, b], "out.csv", &mut logs)
        .await
        .unwrap();

    assert_eq!(prepared.input_files, vec!["a.csv", "b.csv"]);
    assert_eq!(
        std::fs::read_to_string(prepared.workspace.join("a.csv")).unwrap(),
        "x\n1\n"
    );
    assert!(prepared.workspace.join("b.csv").exists());
    assert_eq!(prepared.entry_point, prepared.workspace.join(ENTRYPOINT_FILE));

    let script = std::fs::read_to_string(&prepared.entry_point).unwrap();
    assert!(script.contains(r#"input_files = ["a.csv","b.csv"]"#));
    assert!(script.contains(r#"output_filename = "out.csv""#));

    assert_eq!(logs.len(), 4);
    assert!(logs[0].starts_with("Created temporary directory: "));
    assert_eq!(logs[1], "Copied input file: a.csv");
    assert_eq!(logs[2], "Copied input file: b.csv");
    assert_eq!(logs[3], "Script file created");

    let path = prepared.workspace.path().to_path_buf();
    drop(prepared);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_prepare_missing_input_cleans_up() {
    let env = TestEnv::new();
    let present = env.write_csv("a.csv", "x\n1\n");
    let missing = env.inputs_dir().join("gone.csv");
    let builder =
        SandboxBuilder::new(&SandboxConfig::default().with_workspace_base(env.workspace_base()));

    let mut logs = Vec::new();
    let err = builder
        .prepare("pass", &[present, missing.clone()], "out.csv", &mut logs)
        .await
        .unwrap_err();

    match err {
        ScriptboxError::InputMissing(path) => assert_eq!(path, missing),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(logs.last().unwrap(), "Copied input file: a.csv");
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_prepare_rejects_duplicate_basenames() {
    let env = TestEnv::new();
    let first = env.write_csv("a.csv", "x\n1\n");
    let other_dir = env.inputs_dir().join("other");
    std::fs::create_dir_all(&other_dir).unwrap();
    let second = other_dir.join("a.csv");
    std::fs::write(&second, "x\n2\n").unwrap();
    let builder =
        SandboxBuilder::new(&SandboxConfig::default().with_workspace_base(env.workspace_base()));

    let mut logs = Vec::new();
    let err = builder
        .prepare("pass", &[first, second], "out.csv", &mut logs)
        .await
        .unwrap_err();

    assert!(matches!(err, ScriptboxError::DuplicateInput(name) if name == "a.csv"));
    assert_eq!(env.leftover_workspaces(), 0);
}

// ---------------------------------------------------------------------------
// Result materializer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_finalize_moves_artifact_under_job_name() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    workspace.write_file("out.csv", "x\n2\n3\n").await.unwrap();
    let job_id = Uuid::new_v4();

    let result = store
        .finalize(
            job_id,
            &workspace,
            "out.csv",
            outcome(Some(0), "Output saved to out.csv\n", ""),
            vec!["setup".to_string()],
        )
        .await;

    assert_eq!(result.status(), JobStatus::Completed);
    let path = result.output_path().unwrap().to_path_buf();
    assert_eq!(path, env.artifact_dir().join(format!("{job_id}_out.csv")));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\n2\n3\n");
    assert!(result.error().is_none());
    assert_eq!(
        result.logs,
        vec![
            "setup".to_string(),
            "Output saved to out.csv".to_string(),
            format!("Output file created: {}", path.display()),
        ]
    );
}

#[tokio::test]
async fn test_finalize_nonzero_exit_is_execution_failure() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    // even a produced file is ignored when the process failed
    workspace.write_file("out.csv", "x\n1\n").await.unwrap();

    let result = store
        .finalize(
            Uuid::new_v4(),
            &workspace,
            "out.csv",
            outcome(Some(1), "partial\n", "Traceback\nValueError: bad\n"),
            vec!["setup".to_string()],
        )
        .await;

    assert_eq!(result.status(), JobStatus::Failed);
    assert_eq!(result.failure_kind(), Some(FailureKind::ExecutionFailed));
    assert_eq!(result.error(), Some("Traceback\nValueError: bad\n"));
    assert!(result.output_path().is_none());
    assert_eq!(
        result.logs,
        vec!["setup", "partial", "ERROR: Traceback", "ERROR: ValueError: bad"]
    );
    assert_eq!(env.artifact_count(), 0);
}

#[tokio::test]
async fn test_finalize_nonzero_exit_without_stderr() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();

    let result = store
        .finalize(Uuid::new_v4(), &workspace, "out.csv", outcome(Some(2), "", ""), vec![])
        .await;

    assert_eq!(result.error(), Some("Exit code: 2"));
}

#[tokio::test]
async fn test_finalize_zero_exit_without_artifact() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();

    let result = store
        .finalize(
            Uuid::new_v4(),
            &workspace,
            "out.csv",
            outcome(Some(0), "No 'result' DataFrame found.\n", ""),
            vec![],
        )
        .await;

    assert_eq!(result.status(), JobStatus::Failed);
    assert_eq!(result.failure_kind(), Some(FailureKind::NoResultProduced));
    assert_eq!(result.error(), Some("output artifact was not produced"));
    assert_eq!(result.logs, vec!["No 'result' DataFrame found."]);
}

#[tokio::test]
async fn test_same_output_name_distinct_artifacts() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let mut paths = Vec::new();

    for body in ["x\n1\n", "x\n2\n"] {
        let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
        workspace.write_file("out.csv", body).await.unwrap();
        let result = store
            .finalize(Uuid::new_v4(), &workspace, "out.csv", outcome(Some(0), "", ""), vec![])
            .await;
        paths.push(result.output_path().unwrap().to_path_buf());
    }

    assert_ne!(paths[0], paths[1]);
    assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "x\n1\n");
    assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "x\n2\n");
}

#[tokio::test]
async fn test_finalize_timeout_keeps_output_in_logs() {
    let env = TestEnv::new();
    let store = ArtifactStore::new(env.artifact_dir());
    let workspace = Workspace::create(&env.workspace_base()).await.unwrap();
    // a file left behind by an overrun is never published
    workspace.write_file("out.csv", "x\n1\n").await.unwrap();
    let mut overrun = outcome(None, "loading\n", "slow warning\n");
    overrun.timed_out = Some(Duration::from_secs(5));

    let result = store
        .finalize(Uuid::new_v4(), &workspace, "out.csv", overrun, vec!["setup".to_string()])
        .await;

    assert_eq!(result.status(), JobStatus::Failed);
    assert_eq!(result.failure_kind(), Some(FailureKind::TimedOut));
    assert_eq!(result.error(), Some("execution exceeded the 5s deadline"));
    assert!(result.output_path().is_none());
    assert_eq!(
        result.logs,
        vec![
            "setup",
            "loading",
            "ERROR: slow warning",
            "ERROR: execution exceeded the 5s deadline",
        ]
    );
    assert_eq!(env.artifact_count(), 0);
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_execute_missing_input_fails_without_artifact() {
    let env = TestEnv::new();
    let executor = ScriptExecutor::new(&env.config());
    let missing = env.inputs_dir().join("missing.csv");
    let job_id = Uuid::new_v4();

    let request = ExecutionRequest::new("result = 1", vec![missing.clone()], "out.csv");
    let result = executor.execute(job_id, &request).await;

    assert_eq!(result.job_id, job_id);
    assert_eq!(result.status(), JobStatus::Failed);
    assert_eq!(result.failure_kind(), Some(FailureKind::InputMissing));
    assert!(result.error().unwrap().contains(&missing.display().to_string()));
    assert!(result.output_path().is_none());
    assert!(result.logs[0].starts_with("Created temporary directory: "));
    assert_eq!(env.leftover_workspaces(), 0);
    assert_eq!(env.artifact_count(), 0);
}

#[tokio::test]
async fn test_execute_filters_rows() {
    require_pandas!();
    let env = TestEnv::new();
    let executor = ScriptExecutor::new(&env.config());
    let input = env.write_csv("a.csv", "x\n1\n2\n3\n");

    let request = ExecutionRequest::new(
        "df = dataframes['a.csv']\nresult = df[df['x'] > 1]\nprint('rows', len(result))",
        vec![input],
        "filtered.csv",
    );
    let result = executor.execute(Uuid::new_v4(), &request).await;

    assert_eq!(result.status(), JobStatus::Completed, "{:?}", result.logs);
    let path = result.output_path().unwrap();
    assert_eq!(test_harness::read_lines(path), vec!["x", "2", "3"]);

    // setup, then snippet stdout, then wrapper stdout, then relocation
    assert_eq!(result.logs[1], "Copied input file: a.csv");
    assert_eq!(result.logs[2], "Script file created");
    assert_eq!(result.logs[3], "rows 2");
    assert_eq!(result.logs[4], "Output saved to filtered.csv");
    assert!(result
        .logs
        .last()
        .unwrap()
        .starts_with("Output file created: "));
    assert_eq!(env.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_execute_with_relative_workspace_base() {
    let env = TestEnv::new();
    let base = RelativeBase::new();
    let input = env.write_csv("a.csv", "x\n1\n");
    // `cat` stands in for the interpreter: it exits 0 without writing a result
    let config = env.config().with_sandbox(
        SandboxConfig::default()
            .with_interpreter("cat")
            .with_workspace_base(base.0.clone()),
    );
    let executor = ScriptExecutor::new(&config);

    let request = ExecutionRequest::new("pass", vec![input], "out.csv");
    let result = executor.execute(Uuid::new_v4(), &request).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::NoResultProduced));
    assert!(result
        .logs
        .iter()
        .any(|l| l == "# scriptbox entry point v1"));
    assert_eq!(std::fs::read_dir(&base.0).unwrap().count(), 0);
}
