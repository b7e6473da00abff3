pub mod memory;
pub mod rabbitmq;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::jobs::model::JobType;

/// Ephemeral work item for one job. The input was validated at admission;
/// it travels as raw JSON because the message may cross a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub input: serde_json::Value,
}

/// At-least-once delivery work queue consumed by the dispatcher pool.
///
/// `next` is called concurrently by competing consumers; each delivered
/// message goes to exactly one of them. Redelivery backoff is handled
/// in-line by the consumer, not by the queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, msg: &QueueMessage) -> anyhow::Result<()>;

    /// Next message, or `None` once the queue is closed.
    async fn next(&self) -> Option<QueueMessage>;
}
