use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::infrastructure::queue::QueueMessage;
use crate::modules::notifications::hub::JobUpdateMessage;
use crate::state::AppState;

use super::dto::CreateJobRequest;
use super::model::{Job, JobStatus, JobType};
use super::payload::{JobInput, JobOutput};
use super::store::InsertOutcome;

/// Per-job async mutexes serializing concurrent `apply_status` calls for the
/// same job id, so the state machine holds under a race between a worker
/// callback and a dispatcher failure write. Entries are dropped once the job
/// reaches a terminal state.
#[derive(Default)]
pub struct JobLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, job_id: Uuid) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.entry(job_id).or_default().clone()
    }

    pub async fn release(&self, job_id: Uuid) {
        self.inner.lock().await.remove(&job_id);
    }
}

/// Status update applied through the single state-update operation.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub progress: i32,
    pub status: JobStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Result of `apply_status`: either the update was applied, or it requested
/// an illegal transition and the job was left untouched. Stale updates are
/// expected under duplicate worker callbacks, so they are an outcome rather
/// than an error.
#[derive(Debug)]
pub enum StatusOutcome {
    Applied(Job),
    Stale(Job),
}

impl StatusOutcome {
    pub fn into_job(self) -> Job {
        match self {
            StatusOutcome::Applied(job) | StatusOutcome::Stale(job) => job,
        }
    }
}

pub struct JobService;

impl JobService {
    /// Admit a new job: validate, persist as `queued`, enqueue for dispatch.
    ///
    /// Returns the job plus whether it was newly created; an idempotent
    /// replay returns the existing job and enqueues nothing.
    pub async fn submit(
        state: &AppState,
        user_id: Uuid,
        req: CreateJobRequest,
    ) -> Result<(Job, bool), AppError> {
        let job_type: JobType = req
            .job_type
            .parse()
            .map_err(|_| AppError::UnknownJobType(req.job_type.clone()))?;

        let input = JobInput::parse(job_type, req.input)
            .map_err(|e| AppError::InvalidInput(format!("input does not match {job_type}: {e}")))?;

        if let Some(key) = req.idempotency_key.as_deref() {
            if let Some(existing) = state.store.find_active_by_idempotency_key(key).await? {
                info!(job_id = %existing.id, idempotency_key = key, "idempotent resubmission, returning existing job");
                return Ok((existing, false));
            }
            // Any previous job under this key failed: admit a fresh one.
        }

        let job = Job::new(user_id, req.project_id, input, req.idempotency_key);
        // The insert is the authoritative occupancy check; the lookup above
        // is only a fast path and may race with a concurrent admission.
        match state.store.insert(&job).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::DuplicateKey(existing) => {
                info!(job_id = %existing.id, "admission race on idempotency key, returning winning job");
                return Ok((existing, false));
            }
        }

        let message = QueueMessage {
            job_id: job.id,
            user_id: job.user_id,
            project_id: job.project_id,
            job_type: job.job_type,
            input: job.input.to_value(),
        };

        if let Err(e) = state.queue.publish(&message).await {
            // Never leave a queued job in the store with no live queue entry:
            // fail the job and the request together.
            error!(job_id = %job.id, "enqueue failed after persistence: {:#}", e);
            let update = StatusUpdate {
                progress: 0,
                status: JobStatus::Failed,
                output: None,
                error: Some(format!("failed to enqueue job: {e}")),
            };
            if let Err(mark_err) = Self::apply_status(state, job.id, update).await {
                error!(job_id = %job.id, "failed to mark unenqueued job as failed: {:#}", mark_err);
            }
            return Err(AppError::QueueUnavailable(e.to_string()));
        }

        info!(job_id = %job.id, job_type = %job.job_type, user_id = %user_id, "job admitted");
        Ok((job, true))
    }

    /// The single state-update operation. Serialized per job id; every
    /// accepted update is broadcast through the notification hub.
    pub async fn apply_status(
        state: &AppState,
        job_id: Uuid,
        update: StatusUpdate,
    ) -> Result<StatusOutcome, AppError> {
        let lock = state.job_locks.acquire(job_id).await;
        let _guard = lock.lock().await;

        let mut job = state
            .store
            .find_by_id(job_id)
            .await?
            .ok_or(AppError::NotFound("Job"))?;

        if !job.status.can_transition_to(update.status) {
            warn!(
                job_id = %job_id,
                from = %job.status,
                to = %update.status,
                "ignoring stale status update"
            );
            return Ok(StatusOutcome::Stale(job));
        }

        let now = OffsetDateTime::now_utc();
        match update.status {
            JobStatus::Processing => {
                if job.started_at.is_none() {
                    job.started_at = Some(now);
                }
                // Written in arrival order; a worker pushes at most one
                // update at a time, so regression only occurs on
                // out-of-order delivery, which is accepted.
                job.progress = update.progress;
            }
            JobStatus::Completed => {
                let output_value = update.output.ok_or_else(|| {
                    AppError::InvalidInput("completed status requires an output".to_string())
                })?;
                let output = JobOutput::parse(job.job_type, output_value).map_err(|e| {
                    AppError::InvalidInput(format!(
                        "output does not match {}: {e}",
                        job.job_type
                    ))
                })?;
                job.output = Some(output);
                job.progress = update.progress;
                job.completed_at = Some(now);
            }
            JobStatus::Failed => {
                job.error = update
                    .error
                    .clone()
                    .or_else(|| Some("job failed".to_string()));
                job.progress = update.progress;
                job.completed_at = Some(now);
            }
            // can_transition_to never admits a move back to queued.
            JobStatus::Queued => unreachable!("transition into queued is never accepted"),
        }
        job.status = update.status;

        state.store.update(&job).await?;

        if job.status.is_terminal() {
            state.job_locks.release(job_id).await;
        }

        let delivered = state
            .hub
            .broadcast(&JobUpdateMessage::new(
                job.id,
                job.progress,
                job.status,
                job.error.clone(),
            ))
            .await;
        info!(
            job_id = %job.id,
            status = %job.status,
            progress = job.progress,
            subscribers = delivered,
            "job status updated"
        );

        Ok(StatusOutcome::Applied(job))
    }

    /// Owner-scoped read. A job belonging to another user is reported as
    /// not found rather than forbidden.
    pub async fn get(state: &AppState, user_id: Uuid, job_id: Uuid) -> Result<Job, AppError> {
        match state.store.find_by_id(job_id).await? {
            Some(job) if job.user_id == user_id => Ok(job),
            _ => Err(AppError::NotFound("Job")),
        }
    }

    pub async fn list_by_project(
        state: &AppState,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Job>, AppError> {
        Ok(state.store.list_by_project(user_id, project_id).await?)
    }

    /// Delete a `queued` or `failed` job. A deleted queued job's message is
    /// later discarded by the dispatcher as a no-op delivery; there is no
    /// message-recall primitive.
    pub async fn delete(state: &AppState, user_id: Uuid, job_id: Uuid) -> Result<(), AppError> {
        let job = Self::get(state, user_id, job_id).await?;

        if matches!(job.status, JobStatus::Processing | JobStatus::Completed) {
            return Err(AppError::DeleteConflict(job.status));
        }

        if !state.store.delete(job_id).await? {
            return Err(AppError::NotFound("Job"));
        }
        state.job_locks.release(job_id).await;

        info!(job_id = %job_id, user_id = %user_id, "job deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use serde_json::json;

    fn download_request(key: Option<&str>) -> CreateJobRequest {
        CreateJobRequest {
            project_id: None,
            job_type: "video_download".to_string(),
            input: json!({ "url": "https://example.com/v.mp4" }),
            idempotency_key: key.map(str::to_string),
        }
    }

    fn processing(progress: i32) -> StatusUpdate {
        StatusUpdate {
            progress,
            status: JobStatus::Processing,
            output: None,
            error: None,
        }
    }

    fn completed(output: serde_json::Value) -> StatusUpdate {
        StatusUpdate {
            progress: 100,
            status: JobStatus::Completed,
            output: Some(output),
            error: None,
        }
    }

    #[tokio::test]
    async fn submit_persists_a_queued_job_and_one_message() {
        let (state, queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();

        let (job, created) = JobService::submit(&state, user_id, download_request(Some("k1")))
            .await
            .expect("submit should succeed");

        assert!(created);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn resubmission_with_live_key_returns_same_job_without_new_message() {
        let (state, queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();

        let (first, _) = JobService::submit(&state, user_id, download_request(Some("k1")))
            .await
            .unwrap();
        let (second, created) = JobService::submit(&state, user_id, download_request(Some("k1")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(!created);
        assert_eq!(queue.len(), 1, "replay must not enqueue a second message");
    }

    #[tokio::test]
    async fn concurrent_submissions_with_same_key_admit_exactly_one_job() {
        let (state, queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();

        let results = futures_util::future::join_all(
            (0..4).map(|_| JobService::submit(&state, user_id, download_request(Some("k1")))),
        )
        .await;

        let jobs: Vec<(Job, bool)> = results
            .into_iter()
            .map(|r| r.expect("every submit should succeed"))
            .collect();
        let created = jobs.iter().filter(|(_, created)| *created).count();
        assert_eq!(created, 1, "only one admission may win the key");
        let winner = jobs[0].0.id;
        assert!(jobs.iter().all(|(job, _)| job.id == winner));
        assert_eq!(queue.len(), 1, "exactly one message for the winning job");
    }

    #[tokio::test]
    async fn resubmission_after_failure_creates_a_new_job() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();

        let (first, _) = JobService::submit(&state, user_id, download_request(Some("k1")))
            .await
            .unwrap();
        JobService::apply_status(
            &state,
            first.id,
            StatusUpdate {
                progress: 0,
                status: JobStatus::Failed,
                output: None,
                error: Some("worker unreachable".to_string()),
            },
        )
        .await
        .unwrap();

        let (second, created) = JobService::submit(&state, user_id, download_request(Some("k1")))
            .await
            .unwrap();
        assert!(created);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn unknown_type_is_rejected_before_persistence() {
        let (state, queue) = test_support::state_with_memory_backends();
        let req = CreateJobRequest {
            project_id: None,
            job_type: "voice_swap".to_string(),
            input: json!({}),
            idempotency_key: None,
        };

        let err = JobService::submit(&state, Uuid::new_v4(), req).await;
        assert!(matches!(err, Err(AppError::UnknownJobType(_))));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_persistence() {
        let (state, queue) = test_support::state_with_memory_backends();
        let req = CreateJobRequest {
            project_id: None,
            job_type: "voice_clone".to_string(),
            input: json!({ "text": "missing source audio and language" }),
            idempotency_key: None,
        };

        let err = JobService::submit(&state, Uuid::new_v4(), req).await;
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn first_processing_update_sets_started_at_once() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request(None))
            .await
            .unwrap();

        let after_first = JobService::apply_status(&state, job.id, processing(10))
            .await
            .unwrap()
            .into_job();
        let started_at = after_first.started_at.expect("started_at should be set");

        let after_second = JobService::apply_status(&state, job.id, processing(60))
            .await
            .unwrap()
            .into_job();
        assert_eq!(after_second.started_at, Some(started_at));
        assert_eq!(after_second.progress, 60);
    }

    #[tokio::test]
    async fn completion_requires_a_typed_output() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request(None))
            .await
            .unwrap();

        let missing = JobService::apply_status(&state, job.id, {
            StatusUpdate {
                progress: 100,
                status: JobStatus::Completed,
                output: None,
                error: None,
            }
        })
        .await;
        assert!(matches!(missing, Err(AppError::InvalidInput(_))));

        let wrong_shape = JobService::apply_status(
            &state,
            job.id,
            completed(json!({ "unexpected": true })),
        )
        .await;
        assert!(matches!(wrong_shape, Err(AppError::InvalidInput(_))));

        let done = JobService::apply_status(
            &state,
            job.id,
            completed(json!({ "filePath": "s3://bucket/x.mp4", "duration": 12.0 })),
        )
        .await
        .unwrap()
        .into_job();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.output.is_some());
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn terminal_jobs_ignore_further_updates() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request(None))
            .await
            .unwrap();

        JobService::apply_status(
            &state,
            job.id,
            completed(json!({ "filePath": "s3://bucket/x.mp4", "duration": 12.0 })),
        )
        .await
        .unwrap();

        // A late dispatcher failure write must not override the completion.
        let outcome = JobService::apply_status(
            &state,
            job.id,
            StatusUpdate {
                progress: 0,
                status: JobStatus::Failed,
                output: None,
                error: Some("dispatch failed after 3 attempts".to_string()),
            },
        )
        .await
        .unwrap();

        assert!(matches!(outcome, StatusOutcome::Stale(_)));
        let unchanged = state.store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, JobStatus::Completed);
        assert!(unchanged.error.is_none());
        assert!(unchanged.output.is_some());
    }

    #[tokio::test]
    async fn delete_is_gated_on_status() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();
        let (job, _) = JobService::submit(&state, user_id, download_request(None))
            .await
            .unwrap();

        JobService::apply_status(&state, job.id, processing(5))
            .await
            .unwrap();
        let err = JobService::delete(&state, user_id, job.id).await;
        assert!(matches!(err, Err(AppError::DeleteConflict(_))));

        JobService::apply_status(
            &state,
            job.id,
            StatusUpdate {
                progress: 5,
                status: JobStatus::Failed,
                output: None,
                error: Some("model crashed".to_string()),
            },
        )
        .await
        .unwrap();

        JobService::delete(&state, user_id, job.id)
            .await
            .expect("failed jobs are deletable");
        let err = JobService::get(&state, user_id, job.id).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn reads_are_scoped_to_the_owner() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let owner = Uuid::new_v4();
        let (job, _) = JobService::submit(&state, owner, download_request(None))
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            JobService::get(&state, stranger, job.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            JobService::delete(&state, stranger, job.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(JobService::get(&state, owner, job.id).await.is_ok());
    }

    #[tokio::test]
    async fn status_updates_fan_out_to_subscribers() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.hub.subscribe(tx).await;

        let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request(None))
            .await
            .unwrap();
        JobService::apply_status(&state, job.id, processing(30))
            .await
            .unwrap();

        let raw = rx.recv().await.expect("subscriber should see the update");
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["type"], "job_update");
        assert_eq!(parsed["jobId"], job.id.to_string());
        assert_eq!(parsed["progress"], 30);
        assert_eq!(parsed["status"], "processing");
    }

    #[tokio::test]
    async fn list_by_project_is_scoped_and_newest_first() {
        let (state, _queue) = test_support::state_with_memory_backends();
        let user_id = Uuid::new_v4();
        let project_id = Uuid::new_v4();

        let mut req = download_request(None);
        req.project_id = Some(project_id);
        let (first, _) = JobService::submit(&state, user_id, req).await.unwrap();

        let mut req = download_request(None);
        req.project_id = Some(project_id);
        let (second, _) = JobService::submit(&state, user_id, req).await.unwrap();

        // Unrelated job in another project.
        JobService::submit(&state, user_id, download_request(None))
            .await
            .unwrap();

        let jobs = JobService::list_by_project(&state, user_id, project_id)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));

        let other_user = JobService::list_by_project(&state, Uuid::new_v4(), project_id)
            .await
            .unwrap();
        assert!(other_user.is_empty());
    }
}
