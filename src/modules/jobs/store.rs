use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{Job, JobStatus};

/// Result of an insert: either the job was admitted, or another non-failed
/// job already holds its idempotency key and is returned instead.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    DuplicateKey(Job),
}

/// Durable record store for job entities.
///
/// The store holds persisted state only; state-machine validation and per-job
/// serialization happen in `JobService` before `update` is called.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Key occupancy is checked and the row written as one
    /// atomic step, so two concurrent admissions with the same key cannot
    /// both land: the loser gets `DuplicateKey` with the winning job.
    async fn insert(&self, job: &Job) -> Result<InsertOutcome>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>>;

    /// Most recent non-failed job admitted under `key`, if any. Failed jobs
    /// are ignored so a re-submission after failure creates a fresh job.
    async fn find_active_by_idempotency_key(&self, key: &str) -> Result<Option<Job>>;

    async fn list_by_project(&self, user_id: Uuid, project_id: Uuid) -> Result<Vec<Job>>;

    /// Persist the mutable fields (status, progress, output, error,
    /// started_at, completed_at) of an existing job.
    async fn update(&self, job: &Job) -> Result<()>;

    /// Returns false when no such job existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Map-backed store used in development (no DATABASE_URL) and in tests.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<InsertOutcome> {
        // Lookup and insert under one write lock; the Postgres store gets the
        // same atomicity from its partial unique index.
        let mut jobs = self.jobs.write().await;
        if let Some(key) = job.idempotency_key.as_deref() {
            let existing = jobs
                .values()
                .filter(|j| j.idempotency_key.as_deref() == Some(key))
                .filter(|j| j.status != JobStatus::Failed)
                .max_by_key(|j| j.created_at)
                .cloned();
            if let Some(existing) = existing {
                return Ok(InsertOutcome::DuplicateKey(existing));
            }
        }
        jobs.insert(job.id, job.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_active_by_idempotency_key(&self, key: &str) -> Result<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.idempotency_key.as_deref() == Some(key))
            .filter(|j| j.status != JobStatus::Failed)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn list_by_project(&self, user_id: Uuid, project_id: Uuid) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|j| j.user_id == user_id && j.project_id == Some(project_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                existing.status = job.status;
                existing.progress = job.progress;
                existing.output = job.output.clone();
                existing.error = job.error.clone();
                existing.started_at = job.started_at;
                existing.completed_at = job.completed_at;
                Ok(())
            }
            None => anyhow::bail!("job {} not found", job.id),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
