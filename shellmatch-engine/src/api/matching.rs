//! Batch matching API handlers
//!
//! POST /match/batch, GET /match/jobs, GET /match/jobs/:job_id,
//! POST /match/jobs/:job_id/cancel, POST /match/export

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::export::{build_report, Report};
use crate::models::{BatchRequest, BatchResponse};
use crate::orchestrator::{JobHandle, ProgressSnapshot};
use crate::AppState;

/// Progress view of one running job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub cancel_requested: bool,
    pub progress: ProgressSnapshot,
}

impl From<&JobHandle> for JobStatusResponse {
    fn from(handle: &JobHandle) -> Self {
        let elapsed = Utc::now().signed_duration_since(handle.started_at);
        Self {
            job_id: handle.id,
            started_at: handle.started_at,
            elapsed_seconds: elapsed.num_seconds().max(0) as u64,
            cancel_requested: handle.is_cancelled(),
            progress: handle.progress.snapshot(),
        }
    }
}

/// POST /match/jobs/:job_id/cancel response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    pub cancelled_at: DateTime<Utc>,
    pub progress: ProgressSnapshot,
}

/// POST /match/batch
///
/// Runs the batch to completion and returns the full response. The job is
/// visible under /match/jobs while it runs.
pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchResponse>> {
    if request.customer_ids.is_empty() && request.invalid_customer_ids.is_empty() {
        return Err(ApiError::BadRequest("customerIds must not be empty".to_string()));
    }
    if request.shell_ids.is_empty() {
        return Err(ApiError::BadRequest("shellIds must not be empty".to_string()));
    }

    let job = state.orchestrator.prepare(&state.batch_config, &request)?;
    let job_id = job.id;
    state.jobs.write().await.insert(job_id, job.handle());

    tracing::info!(
        job_id = %job_id,
        customers = request.customer_ids.len(),
        shells = request.shell_ids.len(),
        "Batch job registered"
    );

    // Run detached so a dropped client connection never strands the registry entry
    let orchestrator = state.orchestrator.clone();
    let jobs = state.jobs.clone();
    let task = tokio::spawn(async move {
        let response = orchestrator.run(&job, request).await;
        jobs.write().await.remove(&job.id);
        response
    });

    let response = task.await.map_err(|e| {
        tracing::error!(job_id = %job_id, error = %e, "Batch task failed");
        ApiError::Internal(format!("Batch {} failed: {}", job_id, e))
    })?;

    Ok(Json(response))
}

/// GET /match/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobStatusResponse>> {
    let jobs = state.jobs.read().await;
    let mut statuses: Vec<JobStatusResponse> = jobs.values().map(JobStatusResponse::from).collect();
    statuses.sort_by_key(|s| s.started_at);
    Json(statuses)
}

/// GET /match/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let jobs = state.jobs.read().await;
    let handle = jobs
        .get(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Batch job not running: {}", job_id)))?;

    Ok(Json(JobStatusResponse::from(handle)))
}

/// POST /match/jobs/:job_id/cancel
///
/// Stops new assessment dispatches; in-flight calls finish and the batch
/// request still receives a full result set.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CancelJobResponse>> {
    let handle = state
        .jobs
        .read()
        .await
        .get(&job_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Batch job not running: {}", job_id)))?;

    if !handle.cancel() {
        return Err(ApiError::Conflict(format!("Batch job already cancelled: {}", job_id)));
    }

    tracing::info!(job_id = %job_id, "Batch cancellation requested");

    Ok(Json(CancelJobResponse {
        job_id,
        cancelled_at: Utc::now(),
        progress: handle.progress.snapshot(),
    }))
}

/// POST /match/export
pub async fn export_report(Json(response): Json<BatchResponse>) -> Json<Report> {
    Json(build_report(&response))
}

/// Build matching routes
pub fn matching_routes() -> Router<AppState> {
    Router::new()
        .route("/match/batch", post(run_batch))
        .route("/match/jobs", get(list_jobs))
        .route("/match/jobs/:job_id", get(get_job))
        .route("/match/jobs/:job_id/cancel", post(cancel_job))
        .route("/match/export", post(export_report))
}
