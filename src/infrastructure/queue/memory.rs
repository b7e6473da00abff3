use async_trait::async_trait;

use super::{JobQueue, QueueMessage};

/// In-process queue used in development (no AMQP_URL) and in tests.
/// async-channel gives mpmc semantics, so dispatcher slots compete for
/// messages the same way they do against RabbitMQ.
pub struct MemoryJobQueue {
    tx: async_channel::Sender<QueueMessage>,
    rx: async_channel::Receiver<QueueMessage>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }

    /// Number of messages currently buffered. Test helper.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn publish(&self, msg: &QueueMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg.clone())
            .await
            .map_err(|_| anyhow::anyhow!("job queue is closed"))
    }

    async fn next(&self) -> Option<QueueMessage> {
        self.rx.recv().await.ok()
    }
}
