//! Outbound connection handles
//!
//! The registry holds peers as `Arc<dyn Peer>` so the broadcaster can fan
//! out without knowing the transport, and tests can register in-memory
//! peers that record or fail deliveries.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use tokio::sync::Mutex;

/// Write half of one live client connection
#[async_trait]
pub trait Peer: Send + Sync {
    /// Deliver one serialized frame. An error marks the peer dead.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Liveness probe; transports without one treat it as a success.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Peer backed by the write half of an axum WebSocket
pub struct WsPeer {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsPeer {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Peer for WsPeer {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| anyhow!("websocket send failed: {e}"))
    }

    async fn ping(&self) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| anyhow!("websocket ping failed: {e}"))
    }
}
