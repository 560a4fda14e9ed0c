//! Realtime event fan-out.
//!
//! The hub tracks connected WebSocket clients and publishes JSON envelopes
//! (`{"event": ..., "data": ...}`) either to every client or to the
//! connections of one user (their "room"). Delivery is best-effort: a
//! closed or congested client simply misses the event and is pruned; the
//! queryable notification/activity records remain the source of truth.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Event published on every successful activity append.
pub const ACTIVITY_EVENT: &str = "activity";
/// Event published on a recipient's private room for each notification.
pub const NOTIFICATION_EVENT: &str = "notification";

struct Client {
    /// Room membership; `None` for unauthenticated (dev-mode) sockets.
    user_id: Option<Uuid>,
    tx: mpsc::UnboundedSender<String>,
}

/// Connection registry and publisher, shared across services.
#[derive(Default)]
pub struct RealtimeHub {
    clients: RwLock<HashMap<Uuid, Client>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns its id and the outbound message feed.
    pub async fn subscribe(
        &self,
        user_id: Option<Uuid>,
    ) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();

        let mut clients = self.clients.write().await;
        clients.insert(conn_id, Client { user_id, tx });
        tracing::debug!(
            "Realtime client connected: {} (user: {:?}, total: {})",
            conn_id,
            user_id,
            clients.len()
        );

        (conn_id, rx)
    }

    pub async fn disconnect(&self, conn_id: Uuid) {
        let mut clients = self.clients.write().await;
        if clients.remove(&conn_id).is_some() {
            tracing::debug!(
                "Realtime client disconnected: {} (total: {})",
                conn_id,
                clients.len()
            );
        }
    }

    /// Publish to every connected client.
    pub async fn emit_all(&self, event: &str, payload: &impl Serialize) {
        self.emit(event, payload, |_| true).await;
    }

    /// Publish to the connections of a single user.
    pub async fn emit_to_user(&self, user_id: Uuid, event: &str, payload: &impl Serialize) {
        self.emit(event, payload, |c| c.user_id == Some(user_id))
            .await;
    }

    async fn emit(&self, event: &str, payload: &impl Serialize, filter: impl Fn(&Client) -> bool) {
        let envelope = match serde_json::to_string(&Envelope { event, data: payload }) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to serialize {} event: {}", event, e);
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let clients = self.clients.read().await;
            for (conn_id, client) in clients.iter() {
                if filter(client) && client.tx.send(envelope.clone()).is_err() {
                    dead.push(*conn_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut clients = self.clients.write().await;
            for conn_id in dead {
                let _ = clients.remove(&conn_id);
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}
