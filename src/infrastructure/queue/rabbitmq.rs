use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, options::*, types::FieldTable,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{JobQueue, QueueMessage};

const JOB_QUEUE_NAME: &str = "media_jobs";

/// Durable RabbitMQ-backed job queue.
///
/// Publishes persistent messages to a durable queue and bridges a single
/// broker consumer into an in-process mpmc channel that the dispatcher
/// slots compete on. Messages are acked on receipt; delivery attempts and
/// backoff are the dispatcher's responsibility.
pub struct RabbitMqJobQueue {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
    tx: async_channel::Sender<QueueMessage>,
    rx: async_channel::Receiver<QueueMessage>,
}

impl RabbitMqJobQueue {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        channel
            .queue_declare(
                JOB_QUEUE_NAME,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        let (tx, rx) = async_channel::unbounded();
        Self::spawn_consumer(channel.clone(), tx.clone());

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
            tx,
            rx,
        })
    }

    fn spawn_consumer(channel: Channel, tx: async_channel::Sender<QueueMessage>) {
        tokio::spawn(async move {
            if let Err(e) = consume_loop(channel, tx).await {
                error!("RabbitMQ consume loop ended: {}", e);
            }
        });
    }

    async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        // The old consume bridge died with its channel; attach a fresh one so
        // broker deliveries keep flowing to the dispatcher.
        Self::spawn_consumer(channel.clone(), self.tx.clone());
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    async fn publish_internal(&self, payload: &[u8]) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .basic_publish(
                "",
                JOB_QUEUE_NAME,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2), // Persistent
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }
}

async fn consume_loop(channel: Channel, tx: async_channel::Sender<QueueMessage>) -> Result<()> {
    let mut consumer = channel
        .basic_consume(
            JOB_QUEUE_NAME,
            "job_dispatcher",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                error!("RabbitMQ delivery error: {}", e);
                continue;
            }
        };

        match serde_json::from_slice::<QueueMessage>(&delivery.data) {
            Ok(msg) => {
                if tx.send(msg).await.is_err() {
                    // Dispatcher side is gone; leave the message unacked for
                    // redelivery after restart.
                    return Ok(());
                }
            }
            Err(e) => error!("Failed to parse queue message: {}", e),
        }

        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {}", e);
        }
    }

    Ok(())
}

#[async_trait]
impl JobQueue for RabbitMqJobQueue {
    async fn publish(&self, msg: &QueueMessage) -> Result<()> {
        let payload = serde_json::to_vec(msg)?;

        if let Err(e) = self.publish_internal(&payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.publish_internal(&payload).await?;
        }

        Ok(())
    }

    async fn next(&self) -> Option<QueueMessage> {
        self.rx.recv().await.ok()
    }
}
