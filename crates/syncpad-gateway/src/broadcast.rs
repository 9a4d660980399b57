//! Best-effort fan-out of one frame to every registered connection
//!
//! A broadcast doubles as a liveness check: peers whose send fails are
//! removed from the registry after the pass completes. Nothing here ever
//! returns an error to the caller — partial failure of one peer must not
//! affect delivery to the others.

use serde::Serialize;
use tracing::{debug, warn};

use crate::registry::SessionRegistry;

/// Delivers frames to all registered connections except an optional sender
#[derive(Clone)]
pub struct Broadcaster {
    registry: SessionRegistry,
}

impl Broadcaster {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Send `frame` to every connection whose session id differs from
    /// `exclude_session`. Each member of the snapshot gets exactly one
    /// delivery attempt; connections arriving mid-broadcast are not
    /// included. Returns the number of peers the frame reached.
    pub async fn broadcast<T: Serialize>(&self, frame: &T, exclude_session: Option<&str>) -> usize {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping unserializable frame: {e}");
                return 0;
            }
        };

        // Snapshot first: sends below suspend, and the registry must not
        // be walked live across a suspension point.
        let snapshot = self.registry.snapshot().await;
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, entry) in snapshot {
            if exclude_session.is_some_and(|excluded| excluded == entry.session_id) {
                continue;
            }
            match entry.peer.send_text(&text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Error sending message to {}: {e}", entry.session_id);
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.registry.unregister(id).await;
        }

        debug!("Broadcast reached {delivered} connections");
        delivered
    }
}
