use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;
use crate::common::response::{ApiResponse, ApiSuccess};
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;

use super::dto::{CreateJobRequest, JobResponse, UpdateJobStatusRequest};
use super::model::JobStatus;
use super::service::{JobService, StatusOutcome, StatusUpdate};

/// Submit a job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job admitted", body = ApiResponse<JobResponse>),
        (status = 200, description = "Existing job returned for idempotency key", body = ApiResponse<JobResponse>),
        (status = 400, description = "Unknown job type or malformed input"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Queue unavailable")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn create_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let (job, created) = JobService::submit(&state, claims.sub, payload).await?;

    let (message, status) = if created {
        ("Job admitted", StatusCode::CREATED)
    } else {
        ("Job already admitted for this idempotency key", StatusCode::OK)
    };
    Ok(ApiSuccess(
        ApiResponse::success(JobResponse::from(job), message),
        status,
    ))
}

/// Get job by ID
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job details", body = ApiResponse<JobResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Job not found")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn get_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let job = JobService::get(&state, claims.sub, id).await?;
    Ok(ApiSuccess(
        ApiResponse::success(JobResponse::from(job), "Job retrieved"),
        StatusCode::OK,
    ))
}

/// List jobs for a project
#[utoipa::path(
    get,
    path = "/api/v1/jobs/project/{project_id}",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Jobs for the project, newest first", body = ApiResponse<Vec<JobResponse>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn list_project_jobs(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let jobs = JobService::list_by_project(&state, claims.sub, project_id).await?;
    let jobs: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
    Ok(ApiSuccess(
        ApiResponse::success(jobs, "Jobs retrieved"),
        StatusCode::OK,
    ))
}

/// Delete a queued or failed job
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job deleted", body = ApiResponse<String>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job is processing or completed")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn delete_job(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    JobService::delete(&state, claims.sub, id).await?;
    Ok(ApiSuccess(
        ApiResponse::success(id.to_string(), "Job deleted"),
        StatusCode::OK,
    ))
}

/// Worker status callback
///
/// Authenticated by the shared worker API key, not a bearer token. A stale
/// update (illegal transition) is not an error: the stored job is returned
/// unchanged so duplicate callbacks stay idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/status",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobStatusRequest,
    responses(
        (status = 200, description = "Updated job", body = ApiResponse<JobResponse>),
        (status = 400, description = "Invalid progress, status or output"),
        (status = 401, description = "Missing or mismatched worker API key"),
        (status = 404, description = "Job not found")
    ),
    tag = "Jobs",
    security(("worker_api_key" = []))
)]
pub async fn update_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    // Workers may only report the three worker-reachable states.
    if payload.status == JobStatus::Queued {
        return Err(AppError::InvalidInput(
            "status must be processing, completed or failed".to_string(),
        ));
    }

    let update = StatusUpdate {
        progress: payload.progress,
        status: payload.status,
        output: payload.output,
        error: payload.error,
    };

    let (message, job) = match JobService::apply_status(&state, id, update).await? {
        StatusOutcome::Applied(job) => ("Job status updated", job),
        StatusOutcome::Stale(job) => ("Stale status update ignored", job),
    };

    Ok(ApiSuccess(
        ApiResponse::success(JobResponse::from(job), message),
        StatusCode::OK,
    ))
}
