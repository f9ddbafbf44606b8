use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::ScriptboxError;
use crate::scheduler::{ExecutionRequest, FailureKind, Job, JobStatus};
use crate::templates::{list_templates, Template};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Engine,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ScriptExecutionResponse {
    job_id: String,
    status: JobStatus,
    logs: Vec<String>,
    output_file: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct JobResponse {
    job_id: String,
    status: JobStatus,
    logs: Vec<String>,
    output_file: Option<String>,
    error: Option<String>,
    error_kind: Option<FailureKind>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status,
            logs: job.logs,
            output_file: job.output_path.map(|p| p.display().to_string()),
            error: job.error,
            error_kind: job.error_kind,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Serialize)]
struct JobListResponse {
    jobs: Vec<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type for handlers: a status code plus a message rendered as
/// `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ScriptboxError> for ApiError {
    fn from(e: ScriptboxError) -> Self {
        let status = match &e {
            ScriptboxError::JobNotFound(_) | ScriptboxError::ArtifactUnavailable(_) => {
                StatusCode::NOT_FOUND
            }
            ScriptboxError::InvalidOutputName(_) | ScriptboxError::DuplicateInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ScriptboxError::StoreFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Unparseable ids can never name a job, so they are reported as not found.
fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError {
        status: StatusCode::NOT_FOUND,
        message: format!("Job not found: {raw}"),
    })
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/scripts/templates", get(templates_handler))
        .route("/api/scripts/execute", post(execute_handler))
        .route("/api/scripts/jobs", get(list_jobs_handler))
        .route(
            "/api/scripts/jobs/:job_id",
            get(job_status_handler).delete(delete_job_handler),
        )
        .route(
            "/api/scripts/download/:job_id/:filename",
            get(download_handler),
        )
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_server(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "scriptbox",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn templates_handler() -> Json<&'static [Template]> {
    Json(list_templates())
}

async fn execute_handler(
    State(state): State<ApiState>,
    Json(payload): Json<ExecutionRequest>,
) -> Result<Json<ScriptExecutionResponse>, ApiError> {
    let job_id = state.engine.submit(payload).await?;
    Ok(Json(ScriptExecutionResponse {
        job_id: job_id.to_string(),
        status: JobStatus::Processing,
        logs: Vec::new(),
        output_file: None,
        error: None,
    }))
}

async fn list_jobs_handler(State(state): State<ApiState>) -> Json<JobListResponse> {
    let jobs = state
        .engine
        .list_all()
        .await
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(JobListResponse { jobs })
}

async fn job_status_handler(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.engine.get_status(job_id).await?;
    Ok(Json(job.into()))
}

async fn delete_job_handler(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    state.engine.delete(job_id).await?;
    Ok(Json(MessageResponse {
        message: "Job deleted",
    }))
}

async fn download_handler(
    State(state): State<ApiState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let path = state.engine.artifact(job_id).await?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ScriptboxError::ArtifactUnavailable(job_id))?;

    let filename: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let disposition = if filename.is_empty() {
        "attachment".to_string()
    } else {
        format!("attachment; filename=\"{filename}\"")
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
