use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use scriptbox::api::{run_server, ApiState};
use scriptbox::config::{EngineConfig, SandboxConfig, ServerConfig};
use scriptbox::scheduler::{ExecutionRequest, Job, JobStatus};
use scriptbox::shutdown::install_shutdown_handler;
use scriptbox::templates::list_templates;
use scriptbox::Engine;

#[derive(Parser, Debug)]
#[command(name = "scriptbox")]
#[command(version)]
#[command(about = "Run pandas snippets against CSV files in scratch workspaces")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the HTTP service
    Serve(ServeArgs),

    /// Execute one snippet locally and print the job record
    Run(RunArgs),

    /// List the built-in snippet templates
    Templates {
        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

// =============================================================================
// Arguments
// =============================================================================

/// Settings shared by `serve` and `run`.
#[derive(Parser, Debug)]
struct EngineArgs {
    /// Directory where completed artifacts are stored
    #[arg(long, default_value = "outputs")]
    artifact_dir: PathBuf,

    /// Parent directory for per-run scratch workspaces
    /// (defaults to a directory under the system temp dir)
    #[arg(long)]
    workspace_dir: Option<PathBuf>,

    /// Python interpreter used to run snippets
    #[arg(long, default_value = "python3")]
    python: PathBuf,

    /// Maximum run time per job in seconds (0 disables the limit)
    #[arg(long, default_value = "300")]
    timeout_secs: u64,

    /// Maximum number of job records kept in memory
    #[arg(long, default_value = "10000")]
    max_jobs: usize,
}

impl EngineArgs {
    fn into_config(self) -> EngineConfig {
        let mut sandbox = SandboxConfig::default()
            .with_interpreter(self.python)
            .with_timeout(match self.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            });
        if let Some(dir) = self.workspace_dir {
            sandbox = sandbox.with_workspace_base(dir);
        }
        EngineConfig::new(self.artifact_dir)
            .with_sandbox(sandbox)
            .with_max_jobs(self.max_jobs)
    }
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "8001")]
    port: u16,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// File holding the snippet ("-" reads stdin)
    #[arg(long, short = 's')]
    script: PathBuf,

    /// Input CSV file (repeatable)
    #[arg(long = "input", short = 'i')]
    inputs: Vec<PathBuf>,

    /// Name of the produced CSV
    #[arg(long = "output-name", short = 'n', default_value = "result.csv")]
    output_name: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobStatusOutput {
    job_id: String,
    status: String,
    logs: Vec<String>,
    output_file: Option<String>,
    error: Option<String>,
    error_kind: Option<String>,
}

impl From<&Job> for JobStatusOutput {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status.to_string(),
            logs: job.logs.clone(),
            output_file: job.output_path.as_ref().map(|p| p.display().to_string()),
            error: job.error.clone(),
            error_kind: job.error_kind.map(|k| k.to_string()),
        }
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let config = ServerConfig {
        listen_addr,
        engine: args.engine.into_config(),
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        artifact_dir = %config.engine.artifact_dir.display(),
        interpreter = %config.engine.sandbox.interpreter.display(),
        "Starting scriptbox"
    );

    let engine = Engine::new(config.engine).await?;
    let shutdown = install_shutdown_handler();
    run_server(config.listen_addr, ApiState { engine }, shutdown).await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn run_once(args: RunArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let script = if args.script.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        tokio::fs::read_to_string(&args.script).await?
    };

    let engine = Engine::new(args.engine.into_config()).await?;
    let job_id = engine
        .submit(ExecutionRequest::new(script, args.inputs, args.output_name))
        .await?;
    let job = engine.wait(job_id, Duration::from_millis(100)).await?;

    match args.output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&JobStatusOutput::from(&job))?
            );
        }
        OutputFormat::Table => {
            println!("Job ID:  {}", job.id);
            println!("Status:  {}", job.status);
            if let Some(path) = &job.output_path {
                println!("Output:  {}", path.display());
            }
            if !job.logs.is_empty() {
                println!("Logs:");
                for line in &job.logs {
                    println!("  {}", line);
                }
            }
            if let Some(error) = &job.error {
                println!("Error:");
                for line in error.lines() {
                    println!("  {}", line);
                }
            }
        }
    }

    Ok(job.status == JobStatus::Completed)
}

fn print_templates(output: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(list_templates())?);
        }
        OutputFormat::Table => {
            for template in list_templates() {
                println!("{} - {}", template.name, template.description);
                println!("{}", "-".repeat(60));
                println!("{}", template.template);
                println!();
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve(serve_args) => {
            run_serve(serve_args).await?;
        }
        Commands::Run(run_args) => {
            if !run_once(run_args).await? {
                std::process::exit(1);
            }
        }
        Commands::Templates { output } => {
            print_templates(&output)?;
        }
    }

    Ok(())
}
