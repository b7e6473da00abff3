use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::model::{Job, JobStatus, JobType};
use super::payload::{JobInput, JobOutput};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub project_id: Option<Uuid>,
    /// Kept as a raw string so an unknown type is reported as an admission
    /// error rather than a generic deserialization failure.
    #[serde(rename = "type")]
    pub job_type: String,
    #[schema(value_type = Object)]
    pub input: serde_json::Value,
    #[validate(length(min = 1, message = "Idempotency key must not be empty"))]
    pub idempotency_key: Option<String>,
}

/// Body of the worker status callback (`POST /jobs/{id}/status`).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateJobStatusRequest {
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: i32,
    pub status: JobStatus,
    #[schema(value_type = Option<Object>)]
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Client-facing job representation. camelCase end to end, so the envelope
/// fields match the casing of the typed payloads nested inside them.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    #[schema(value_type = Object)]
    pub input: JobInput,
    #[schema(value_type = Option<Object>)]
    pub output: Option<JobOutput>,
    pub progress: i32,
    pub error: Option<String>,
    pub idempotency_key: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::iso8601::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            user_id: job.user_id,
            project_id: job.project_id,
            job_type: job.job_type,
            status: job.status,
            input: job.input,
            output: job.output,
            progress: job.progress,
            error: job.error,
            idempotency_key: job.idempotency_key,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}
