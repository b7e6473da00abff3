use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::infrastructure::db::pool::DbPool;

use super::model::{Job, JobStatus, JobType};
use super::payload::{JobInput, JobOutput};
use super::store::{InsertOutcome, JobStore};

/// Postgres-backed [`JobStore`]. Payloads are stored as JSONB and re-parsed
/// against the job's type on read, so a corrupted row fails loudly instead of
/// flowing downstream untyped.
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    user_id: Uuid,
    project_id: Option<Uuid>,
    job_type: String,
    status: String,
    input: serde_json::Value,
    output: Option<serde_json::Value>,
    progress: i32,
    error: Option<String>,
    idempotency_key: Option<String>,
    created_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let job_type: JobType = row
            .job_type
            .parse()
            .map_err(|_| anyhow!("job {} has unknown type {}", row.id, row.job_type))?;
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|_| anyhow!("job {} has unknown status {}", row.id, row.status))?;
        let input = JobInput::parse(job_type, row.input)
            .map_err(|e| anyhow!("job {} input does not match type: {}", row.id, e))?;
        let output = row
            .output
            .map(|v| JobOutput::parse(job_type, v))
            .transpose()
            .map_err(|e| anyhow!("job {} output does not match type: {}", row.id, e))?;

        Ok(Job {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            job_type,
            status,
            input,
            output,
            progress: row.progress,
            error: row.error,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, user_id, project_id, job_type, status, input, output, \
                           progress, error, idempotency_key, created_at, started_at, completed_at";

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO jobs (id, user_id, project_id, job_type, status, input, \
             progress, idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.project_id)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(job.input.to_value())
        .bind(job.progress)
        .bind(&job.idempotency_key)
        .bind(job.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            // The partial unique index on active idempotency keys caught a
            // concurrent admission; surface the winning job instead.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                if let Some(key) = job.idempotency_key.as_deref() {
                    if let Some(existing) = self.find_active_by_idempotency_key(key).await? {
                        return Ok(InsertOutcome::DuplicateKey(existing));
                    }
                }
                Err(anyhow!("Failed to insert job: {}", db.message()))
            }
            Err(e) => Err(anyhow!("Failed to insert job: {}", e)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch job: {}", e))?;

        row.map(Job::try_from).transpose()
    }

    async fn find_active_by_idempotency_key(&self, key: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE idempotency_key = $1 AND status != 'failed' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch job by idempotency key: {}", e))?;

        row.map(Job::try_from).transpose()
    }

    async fn list_by_project(&self, user_id: Uuid, project_id: Uuid) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE user_id = $1 AND project_id = $2 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list jobs: {}", e))?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, progress = $2, output = $3, error = $4, \
             started_at = $5, completed_at = $6 \
             WHERE id = $7",
        )
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(job.output.as_ref().map(|o| o.to_value()))
        .bind(&job.error)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to update job: {}", e))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("job {} not found", job.id);
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to delete job: {}", e))?;

        Ok(result.rows_affected() > 0)
    }
}
