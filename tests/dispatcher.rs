mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use videoforge::infrastructure::queue::{JobQueue, QueueMessage};
use videoforge::modules::jobs::dto::CreateJobRequest;
use videoforge::modules::jobs::model::{Job, JobStatus, JobType};
use videoforge::modules::jobs::service::JobService;
use videoforge::state::AppState;
use videoforge::workers::dispatcher;

struct MockWorker {
    url: Url,
    calls: Arc<AtomicUsize>,
    last_api_key: Arc<Mutex<Option<String>>>,
}

/// Throwaway worker bound to an ephemeral port. `reply` decides the response
/// per call, indexed from zero.
async fn spawn_worker<F>(reply: F) -> MockWorker
where
    F: Fn(usize) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let last_api_key = Arc::new(Mutex::new(None));

    let calls_handle = calls.clone();
    let key_handle = last_api_key.clone();
    let reply = Arc::new(reply);
    let app = Router::new().route(
        "/execute",
        post(move |headers: HeaderMap, Json(_body): Json<Value>| {
            let n = calls_handle.fetch_add(1, Ordering::SeqCst);
            let key = headers
                .get("x-worker-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let (status, body) = reply(n);
            let key_handle = key_handle.clone();
            async move {
                *key_handle.lock().await = key;
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockWorker {
        url: Url::parse(&format!("http://{addr}")).expect("mock worker url"),
        calls,
        last_api_key,
    }
}

fn download_request() -> CreateJobRequest {
    CreateJobRequest {
        project_id: None,
        job_type: "video_download".to_string(),
        input: json!({ "url": "https://example.com/source.mp4" }),
        idempotency_key: None,
    }
}

async fn wait_for_status(state: &AppState, id: Uuid, status: JobStatus) -> Job {
    for _ in 0..500 {
        if let Some(job) = state.store.find_by_id(id).await.expect("store read") {
            if job.status == status {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {status:?}");
}

async fn wait_for_calls(worker: &MockWorker, expected: usize) {
    for _ in 0..500 {
        if worker.calls.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "worker saw {} calls, expected {expected}",
        worker.calls.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn accepted_dispatch_leaves_the_job_queued() {
    let worker = spawn_worker(|_| (StatusCode::OK, json!({ "status": "accepted" }))).await;
    let (state, _queue) = common::app_state_with_endpoints(HashMap::from([(
        JobType::VideoDownload,
        worker.url.clone(),
    )]));
    dispatcher::spawn(state.clone());

    let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request())
        .await
        .expect("submit should succeed");

    wait_for_calls(&worker, 1).await;
    // Give the dispatcher a moment to (incorrectly) write anything further.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
    let stored = state.store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued, "worker reports processing itself");
    assert_eq!(
        worker.last_api_key.lock().await.as_deref(),
        Some(common::WORKER_KEY)
    );
}

#[tokio::test]
async fn failing_worker_exhausts_attempts_and_fails_the_job() {
    let worker = spawn_worker(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "gpu pool exhausted" }),
        )
    })
    .await;
    let (state, _queue) = common::app_state_with_endpoints(HashMap::from([(
        JobType::VideoDownload,
        worker.url.clone(),
    )]));
    dispatcher::spawn(state.clone());

    let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request())
        .await
        .unwrap();

    let failed = wait_for_status(&state, job.id, JobStatus::Failed).await;
    assert_eq!(worker.calls.load(Ordering::SeqCst), 3);
    let error = failed.error.expect("failed job carries an error");
    assert!(error.contains("3 attempts"), "unexpected error: {error}");
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn explicit_rejection_counts_as_a_failed_attempt() {
    let worker = spawn_worker(|_| {
        (
            StatusCode::OK,
            json!({ "status": "rejected", "message": "unsupported codec" }),
        )
    })
    .await;
    let (state, _queue) = common::app_state_with_endpoints(HashMap::from([(
        JobType::VideoDownload,
        worker.url.clone(),
    )]));
    dispatcher::spawn(state.clone());

    let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request())
        .await
        .unwrap();

    let failed = wait_for_status(&state, job.id, JobStatus::Failed).await;
    assert_eq!(worker.calls.load(Ordering::SeqCst), 3);
    assert!(failed.error.unwrap().contains("unsupported codec"));
}

#[tokio::test]
async fn transient_rejections_succeed_on_a_later_attempt() {
    let worker = spawn_worker(|n| {
        if n < 2 {
            (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": "busy" }))
        } else {
            (StatusCode::OK, json!({ "status": "accepted" }))
        }
    })
    .await;
    let (state, _queue) = common::app_state_with_endpoints(HashMap::from([(
        JobType::VideoDownload,
        worker.url.clone(),
    )]));
    dispatcher::spawn(state.clone());

    let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request())
        .await
        .unwrap();

    wait_for_calls(&worker, 3).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = state.store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued, "third attempt was accepted");
}

#[tokio::test]
async fn missing_endpoint_is_a_permanent_failure() {
    let (state, _queue) = common::app_state_with_endpoints(HashMap::new());
    dispatcher::spawn(state.clone());

    let (job, _) = JobService::submit(&state, Uuid::new_v4(), download_request())
        .await
        .unwrap();

    let failed = wait_for_status(&state, job.id, JobStatus::Failed).await;
    assert!(failed.error.unwrap().contains("no worker endpoint"));
}

#[tokio::test]
async fn message_for_a_deleted_job_is_discarded() {
    let worker = spawn_worker(|_| (StatusCode::OK, json!({ "status": "accepted" }))).await;
    let (state, queue) = common::app_state_with_endpoints(HashMap::from([(
        JobType::VideoDownload,
        worker.url.clone(),
    )]));
    dispatcher::spawn(state.clone());

    // Message whose job no longer exists in the store.
    let orphan = QueueMessage {
        job_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        project_id: None,
        job_type: JobType::VideoDownload,
        input: json!({ "url": "https://example.com/source.mp4" }),
    };
    queue.publish(&orphan).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(worker.calls.load(Ordering::SeqCst), 0);
    assert!(queue.is_empty());
}
