//! Dispatch consumer pool.
//!
//! A fixed number of consumers pull queue messages and forward each job to
//! its worker's `/execute` endpoint. Dispatch failure (worker unreachable,
//! non-2xx, explicit rejection) is retried in-line with exponential backoff;
//! the backoff sleep occupies only that consumer's slot. Execution failure is
//! a different domain entirely: an accepted job fails later through the
//! worker's own status callback, never through redelivery here.

use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::infrastructure::queue::QueueMessage;
use crate::middleware::worker_auth::WORKER_API_KEY_HEADER;
use crate::modules::jobs::model::{JobStatus, JobType};
use crate::modules::jobs::service::{JobService, StatusUpdate};
use crate::state::AppState;

/// Outbound execute contract: `POST {workerBaseUrl}/execute`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerExecuteRequest {
    job_id: Uuid,
    #[serde(rename = "type")]
    job_type: JobType,
    input: Value,
}

impl WorkerExecuteRequest {
    /// The worker receives the job input merged with the requesting user and
    /// project, so it can scope storage paths without a DB lookup.
    fn from_message(msg: &QueueMessage) -> Self {
        let mut input = msg.input.clone();
        if let Value::Object(ref mut map) = input {
            map.insert("userId".to_string(), Value::String(msg.user_id.to_string()));
            if let Some(project_id) = msg.project_id {
                map.insert(
                    "projectId".to_string(),
                    Value::String(project_id.to_string()),
                );
            }
        }
        Self {
            job_id: msg.job_id,
            job_type: msg.job_type,
            input,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WorkerDecision {
    Accepted,
    Rejected,
}

#[derive(Debug, Deserialize)]
struct WorkerExecuteResponse {
    status: WorkerDecision,
    #[serde(default)]
    message: Option<String>,
}

/// Launch the consumer pool. Consumers run until the queue closes.
pub fn spawn(state: AppState) {
    let slots = state.config.dispatch_concurrency;
    info!(slots, "starting dispatch consumer pool");
    for slot in 0..slots {
        let state = state.clone();
        tokio::spawn(run_consumer(slot, state));
    }
}

async fn run_consumer(slot: usize, state: AppState) {
    debug!(slot, "dispatch consumer started");
    while let Some(msg) = state.queue.next().await {
        // One job's failure is isolated to that job; the pool keeps going.
        if let Err(e) = handle_message(&state, &msg).await {
            error!(slot, job_id = %msg.job_id, "dispatch handling error: {:#}", e);
        }
    }
    debug!(slot, "dispatch consumer stopped: queue closed");
}

async fn handle_message(state: &AppState, msg: &QueueMessage) -> Result<()> {
    // The job may have been deleted while queued; its message is then a
    // no-op delivery, not an error.
    if state.store.find_by_id(msg.job_id).await?.is_none() {
        debug!(job_id = %msg.job_id, "discarding message for deleted job");
        return Ok(());
    }

    let Some(base_url) = state.config.worker_endpoints.url_for(msg.job_type) else {
        // Configuration error, permanently fatal for this job; retrying
        // cannot fix it.
        warn!(job_id = %msg.job_id, job_type = %msg.job_type, "no worker endpoint configured");
        mark_failed(
            state,
            msg.job_id,
            format!("no worker endpoint configured for job type: {}", msg.job_type),
        )
        .await;
        return Ok(());
    };

    let url = format!("{}/execute", base_url.as_str().trim_end_matches('/'));
    let request = WorkerExecuteRequest::from_message(msg);
    let max_attempts = state.config.dispatch_max_attempts;

    for attempt in 1..=max_attempts {
        match execute(state, &url, &request).await {
            Ok(()) => {
                // Accepted only means the worker took the job; it reports
                // `processing` itself once it actually starts.
                info!(job_id = %msg.job_id, url, attempt, "job dispatched");
                return Ok(());
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay(state.config.dispatch_backoff, attempt);
                warn!(
                    job_id = %msg.job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "dispatch attempt failed: {e}; backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(job_id = %msg.job_id, "dispatch failed after {max_attempts} attempts: {e}");
                mark_failed(
                    state,
                    msg.job_id,
                    format!("dispatch failed after {max_attempts} attempts: {e}"),
                )
                .await;
            }
        }
    }

    Ok(())
}

/// One dispatch attempt. Transport errors, non-2xx responses, unparseable
/// bodies and explicit rejections all count as attempt failures.
async fn execute(state: &AppState, url: &str, request: &WorkerExecuteRequest) -> Result<()> {
    let mut builder = state.http.post(url).json(request);
    if let Some(key) = state.config.worker_api_key.as_deref() {
        builder = builder.header(WORKER_API_KEY_HEADER, key);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| anyhow!("worker unreachable: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("worker returned {status}: {body}"));
    }

    let body: WorkerExecuteResponse = response
        .json()
        .await
        .map_err(|e| anyhow!("invalid execute response: {e}"))?;

    match body.status {
        WorkerDecision::Accepted => Ok(()),
        WorkerDecision::Rejected => Err(anyhow!(
            "worker rejected job: {}",
            body.message.unwrap_or_else(|| "no reason given".to_string())
        )),
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt - 1)
}

/// The only path through which the dispatcher writes job state. Goes through
/// `apply_status`, so a job the worker already completed stays completed.
async fn mark_failed(state: &AppState, job_id: Uuid, reason: String) {
    let update = StatusUpdate {
        progress: 0,
        status: JobStatus::Failed,
        output: None,
        error: Some(reason),
    };
    match JobService::apply_status(state, job_id, update).await {
        Ok(_) => {}
        Err(e) => error!(job_id = %job_id, "failed to record dispatch failure: {:#}", e),
    }
}
