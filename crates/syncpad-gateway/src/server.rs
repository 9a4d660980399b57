//! Gateway server: router wiring and the per-connection WebSocket loop

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderValue;
use axum::response::Response;
use axum::routing::{get, post, put};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use syncpad_core::Config;
use syncpad_store::Store;

use crate::error::GatewayError;
use crate::peer::{Peer, WsPeer};
use crate::protocol::{ClientFrame, DisconnectNotice, Envelope};
use crate::routes;
use crate::state::AppState;

/// The syncpad gateway: HTTP API plus the realtime sync endpoint
pub struct GatewayServer {
    config: Config,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: Config, store: Arc<Store>) -> Self {
        let state = AppState::new(store, config.server.clone());
        Self { config, state }
    }

    /// Build a server around existing state (used by tests)
    pub fn with_state(config: Config, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Bind to the configured address and serve until shutdown
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr = self.config.server.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), GatewayError> {
        if let Ok(addr) = listener.local_addr() {
            info!("syncpad gateway listening on {addr}");
        }
        let router = create_router(self.state);
        axum::serve(listener, router)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

/// Router with the REST endpoints and the realtime sync endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::status))
        .route(
            "/api/page-data",
            get(routes::get_page_data).put(routes::update_page_data),
        )
        .route("/api/page-data/image", post(routes::upload_page_image))
        .route(
            "/api/page-data/partner-logo",
            post(routes::upload_partner_logo),
        )
        .route(
            "/api/project-cards",
            get(routes::list_cards).post(routes::create_card),
        )
        .route(
            "/api/project-cards/{id}",
            put(routes::update_card).delete(routes::delete_card),
        )
        .route(
            "/api/project-cards/{id}/image",
            post(routes::upload_card_image),
        )
        .route(
            "/api/events",
            get(routes::list_events).post(routes::create_event),
        )
        .route(
            "/api/events/{id}",
            put(routes::update_event).delete(routes::delete_event),
        )
        .route("/ws/{session_id}", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Permissive CORS in debug; otherwise only the configured frontend origin
fn cors_layer(state: &AppState) -> CorsLayer {
    if state.server.debug {
        return CorsLayer::permissive();
    }
    match state.server.frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(
                "Invalid frontend_origin {:?}, falling back to permissive CORS",
                state.server.frontend_origin
            );
            CorsLayer::permissive()
        }
    }
}

/// WebSocket upgrade for /ws/{session_id}
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Per-connection loop: register, pump frames, clean up
///
/// Every inbound frame is parsed, stamped with the sender's session id and
/// the server clock, and broadcast to everyone else. Any exit — peer close,
/// malformed frame, socket error, heartbeat timeout — takes the same
/// cleanup path: unregister, then notify the remaining sessions.
async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (sink, mut stream) = socket.split();
    let peer: Arc<dyn Peer> = Arc::new(WsPeer::new(sink));
    let connection_id = state.registry.register(peer.clone(), session_id.clone()).await;

    let timeout = state.server.heartbeat_timeout();
    let mut ping_timer = interval(state.server.heartbeat_interval());
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping_timer.tick().await; // the first tick completes immediately
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    let frame: ClientFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Malformed frame from {session_id}: {e}");
                            break;
                        }
                    };
                    let envelope = Envelope::stamp(frame, &session_id);
                    // Awaited: the next read only happens once the fan-out
                    // for this frame has finished.
                    state.broadcaster.broadcast(&envelope, Some(&session_id)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Session {session_id} closed the connection");
                    break;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    last_seen = Instant::now();
                }
                Some(Ok(Message::Binary(_))) => {
                    // Binary frames are not part of the protocol
                    warn!("Binary frame from {session_id}, closing");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error for {session_id}: {e}");
                    break;
                }
            },
            _ = ping_timer.tick() => {
                if last_seen.elapsed() > timeout {
                    warn!("Session {session_id} timed out after {timeout:?} of silence");
                    break;
                }
                if peer.ping().await.is_err() {
                    break;
                }
            }
        }
    }

    state.registry.unregister(connection_id).await;
    state
        .broadcaster
        .broadcast(&DisconnectNotice::new(session_id), None)
        .await;
}
