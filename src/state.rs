use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::queue::JobQueue;
use crate::modules::jobs::service::JobLocks;
use crate::modules::jobs::store::JobStore;
use crate::modules::notifications::hub::NotificationHub;

/// Shared application state, cloned into every handler and consumer task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub hub: Arc<NotificationHub>,
    pub job_locks: Arc<JobLocks>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.worker_request_timeout)
            .build()?;

        Ok(Self {
            config,
            store,
            queue,
            hub: Arc::new(NotificationHub::new()),
            job_locks: Arc::new(JobLocks::new()),
            http,
        })
    }
}
