//! Shared application state for the gateway

use std::sync::Arc;

use chrono::{DateTime, Utc};
use syncpad_core::ServerConfig;
use syncpad_store::Store;

use crate::broadcast::Broadcaster;
use crate::registry::SessionRegistry;

/// State accessible by every handler
#[derive(Clone)]
pub struct AppState {
    /// Active connection set
    pub registry: SessionRegistry,
    /// Fan-out engine over the same registry
    pub broadcaster: Broadcaster,
    /// Persistence for page data, cards, and events
    pub store: Arc<Store>,
    /// Server settings (heartbeat, CORS, debug)
    pub server: ServerConfig,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<Store>, server: ServerConfig) -> Self {
        let registry = SessionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        Self {
            registry,
            broadcaster,
            store,
            server,
            started_at: Utc::now(),
        }
    }
}
