#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use url::Url;
use uuid::Uuid;

use videoforge::config::settings::{AppConfig, AppEnv, WorkerEndpoints};
use videoforge::infrastructure::queue::memory::MemoryJobQueue;
use videoforge::middleware::auth::TokenClaims;
use videoforge::modules::jobs::model::JobType;
use videoforge::modules::jobs::store::MemoryJobStore;
use videoforge::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const WORKER_KEY: &str = "integration-worker-key";

pub fn config_with_endpoints(endpoints: HashMap<JobType, Url>) -> AppConfig {
    AppConfig {
        server_port: 0,
        app_env: AppEnv::Development,
        jwt_secret: JWT_SECRET.to_string(),
        worker_api_key: Some(WORKER_KEY.to_string()),
        database_url: None,
        amqp_url: None,
        dispatch_concurrency: 2,
        dispatch_max_attempts: 3,
        dispatch_backoff: Duration::from_millis(5),
        worker_request_timeout: Duration::from_secs(2),
        worker_endpoints: WorkerEndpoints::from_map(endpoints),
    }
}

pub fn app_state() -> (AppState, Arc<MemoryJobQueue>) {
    app_state_with_endpoints(HashMap::new())
}

pub fn app_state_with_endpoints(
    endpoints: HashMap<JobType, Url>,
) -> (AppState, Arc<MemoryJobQueue>) {
    let queue = Arc::new(MemoryJobQueue::new());
    let state = AppState::new(
        Arc::new(config_with_endpoints(endpoints)),
        Arc::new(MemoryJobStore::new()),
        queue.clone(),
    )
    .expect("test state should build");
    (state, queue)
}

/// Development profile: no worker key configured, callback auth skipped.
pub fn app_state_without_worker_key() -> (AppState, Arc<MemoryJobQueue>) {
    let mut config = config_with_endpoints(HashMap::new());
    config.worker_api_key = None;
    let queue = Arc::new(MemoryJobQueue::new());
    let state = AppState::new(
        Arc::new(config),
        Arc::new(MemoryJobStore::new()),
        queue.clone(),
    )
    .expect("test state should build");
    (state, queue)
}

pub fn token_for(user_id: Uuid) -> String {
    let claims = TokenClaims {
        sub: user_id,
        exp: 4_102_444_800, // 2100-01-01, never expires within a test run
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token encoding should succeed")
}

pub fn bearer_for(user_id: Uuid) -> String {
    format!("Bearer {}", token_for(user_id))
}
