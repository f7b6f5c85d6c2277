use std::collections::HashMap;

use archytex_core::types::{Timestamp, UserId};
use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Outbound frames buffered per connection before senders wait.
pub const OUTBOUND_BUFFER: usize = 32;

/// Channel sender half for pushing frames to a WebSocket connection.
pub type WsSender = mpsc::Sender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// The user whose updates this connection carries.
    pub user_id: UserId,
    /// Outbound frames, drained by the connection's writer task.
    pub sender: WsSender,
    /// Cancels the connection's subscription. Child of the manager's root
    /// token.
    pub cancel: CancellationToken,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Handles returned when a connection is registered.
pub struct Registration {
    /// Frames queued for this connection; the writer task owns it.
    pub receiver: mpsc::Receiver<Message>,
    pub sender: WsSender,
    pub cancel: CancellationToken,
}

/// Registry of live WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. Bookkeeping only: update delivery goes
/// through each connection's own subscription.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    root: CancellationToken,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    /// Register a connection for `user_id`.
    pub async fn add(&self, conn_id: String, user_id: UserId) -> Registration {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        let cancel = self.root.child_token();
        let conn = WsConnection {
            user_id,
            sender: sender.clone(),
            cancel: cancel.clone(),
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        Registration {
            receiver,
            sender,
            cancel,
        }
    }

    /// Remove a connection and cancel its subscription.
    pub async fn remove(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.remove(conn_id) {
            conn.cancel.cancel();
            let open_for = chrono::Utc::now() - conn.connected_at;
            tracing::debug!(
                conn_id,
                user_id = %conn.user_id,
                open_secs = open_for.num_seconds(),
                "WebSocket connection removed",
            );
        }
    }

    /// Find all connection IDs associated with a given user.
    pub async fn get_by_user(&self, user_id: UserId) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.user_id == user_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Cancel every subscription, queue a Close frame for every client and
    /// clear the registry. Connections opened afterwards start cancelled.
    pub async fn shutdown_all(&self) {
        self.root.cancel();
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.try_send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Queue a Ping frame for every connected client. Connections whose
    /// outbound buffer is full are skipped this round.
    pub async fn ping_all(&self) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|conn| conn.sender.try_send(Message::Ping(Bytes::new())).is_ok())
            .count()
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
