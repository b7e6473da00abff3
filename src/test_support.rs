//! Shared fixtures for unit tests: app state wired to in-memory backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::{AppConfig, AppEnv, WorkerEndpoints};
use crate::infrastructure::queue::memory::MemoryJobQueue;
use crate::modules::jobs::store::MemoryJobStore;
use crate::state::AppState;

pub fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        app_env: AppEnv::Development,
        jwt_secret: "test-jwt-secret".to_string(),
        worker_api_key: Some("test-worker-key".to_string()),
        database_url: None,
        amqp_url: None,
        dispatch_concurrency: 2,
        dispatch_max_attempts: 3,
        dispatch_backoff: Duration::from_millis(5),
        worker_request_timeout: Duration::from_secs(2),
        worker_endpoints: WorkerEndpoints::from_map(HashMap::new()),
    }
}

/// State backed by the memory store and memory queue. The queue handle is
/// returned separately so tests can inspect what was published.
pub fn state_with_memory_backends() -> (AppState, Arc<MemoryJobQueue>) {
    let queue = Arc::new(MemoryJobQueue::new());
    let state = AppState::new(
        Arc::new(test_config()),
        Arc::new(MemoryJobStore::new()),
        queue.clone(),
    )
    .expect("test state should build");
    (state, queue)
}
