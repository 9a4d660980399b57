//! Wire format for the /ws/{session_id} endpoint — JSON frames
//!
//! Inbound frames carry only `type` and `data`; the server stamps the
//! sender's session id and its own clock before fan-out. Clients never
//! control the `session_id` field.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame type of the lifecycle notice sent when a session leaves
pub const USER_DISCONNECTED: &str = "user_disconnected";

/// Client → server frame. Both fields are optional; missing values travel
/// on as null rather than being rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Server-stamped envelope fanned out to the other sessions
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub data: Value,
    pub session_id: String,
    pub timestamp: String,
}

impl Envelope {
    /// Stamp an inbound frame with its sender and the server clock
    pub fn stamp(frame: ClientFrame, session_id: &str) -> Self {
        Self {
            kind: frame.kind,
            data: frame.data,
            session_id: session_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Lifecycle notice broadcast after a session has been unregistered
#[derive(Debug, Clone, Serialize)]
pub struct DisconnectNotice {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session_id: String,
}

impl DisconnectNotice {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            kind: USER_DISCONNECTED,
            session_id: session_id.into(),
        }
    }
}
