//! syncpad-gateway — real-time sync plane and HTTP API for syncpad
//!
//! Clients connect over WebSocket with a session identifier in the path;
//! every edit a client sends is stamped and fanned out to all other live
//! sessions. The same router serves the page/card/event REST endpoints.

pub mod broadcast;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;

pub use broadcast::Broadcaster;
pub use error::GatewayError;
pub use registry::{ConnectionId, SessionRegistry};
pub use server::GatewayServer;
pub use state::AppState;
