use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::modules::jobs::model::JobStatus;

/// Message pushed to every live subscriber on each accepted status update.
/// Field names are fixed by the client contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdateMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub job_id: Uuid,
    pub progress: i32,
    pub status: JobStatus,
    pub error: Option<String>,
}

impl JobUpdateMessage {
    pub fn new(job_id: Uuid, progress: i32, status: JobStatus, error: Option<String>) -> Self {
        Self {
            kind: "job_update",
            job_id,
            progress,
            status,
            error,
        }
    }
}

/// Registry of live subscriber connections.
///
/// Constructed once at startup and shared through `AppState`. Fan-out is
/// best-effort: a connection whose channel is closed is pruned by the
/// broadcast that observes the failure, and one broken subscriber never
/// blocks delivery to the others.
#[derive(Default)]
pub struct NotificationHub {
    connections: RwLock<HashMap<Uuid, UnboundedSender<String>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, tx: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.write().await.insert(id, tx);
        debug!(connection_id = %id, "websocket subscriber registered");
        id
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        if self.connections.write().await.remove(&id).is_some() {
            debug!(connection_id = %id, "websocket subscriber removed");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Push `message` to every live connection. Returns how many subscribers
    /// it was delivered to.
    pub async fn broadcast(&self, message: &JobUpdateMessage) -> usize {
        let payload = match serde_json::to_string(message) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize job update: {}", e);
                return 0;
            }
        };

        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let connections = self.connections.read().await;
            for (id, tx) in connections.iter() {
                if tx.send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            for id in dead {
                connections.remove(&id);
                debug!(connection_id = %id, "pruned closed websocket subscriber");
            }
        }

        delivered
    }
}
