//! Active connection registry
//!
//! Entries are keyed by a per-connection id rather than the session id, so
//! two tabs sharing a session id each get their own entry and are never
//! deduplicated. `register`/`unregister` hold the lock only for the map
//! mutation itself — never across an await on a socket.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::peer::Peer;

/// Opaque handle to one registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One registered connection: the caller-supplied session id plus the
/// shared outbound handle
#[derive(Clone)]
pub struct SessionEntry {
    pub session_id: String,
    pub peer: Arc<dyn Peer>,
    pub connected_at: DateTime<Utc>,
}

/// Tracks live connections
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to the active set. No uniqueness requirement on
    /// the session id.
    pub async fn register(&self, peer: Arc<dyn Peer>, session_id: impl Into<String>) -> ConnectionId {
        let id = ConnectionId::new();
        let entry = SessionEntry {
            session_id: session_id.into(),
            peer,
            connected_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        info!(
            "Client {} connected. Total connections: {}",
            entry.session_id,
            inner.len() + 1
        );
        inner.insert(id, entry);
        id
    }

    /// Remove a connection; a no-op when it is already gone
    pub async fn unregister(&self, id: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.remove(&id) {
            info!(
                "Client {} disconnected. Total connections: {}",
                entry.session_id,
                inner.len()
            );
        }
    }

    /// Point-in-time copy of the active set. The broadcaster prunes
    /// entries while iterating, so it must never walk the live map.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, SessionEntry)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }

    /// Current active-set size
    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
