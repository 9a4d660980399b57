//! Shared helpers for gateway integration tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use syncpad_core::Config;
use syncpad_gateway::{AppState, GatewayServer};
use syncpad_store::Store;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawn a server on an ephemeral port; returns its state and address
#[allow(dead_code)]
pub async fn spawn_server() -> (AppState, SocketAddr) {
    spawn_server_with_config(Config::default()).await
}

/// Spawn a server with custom settings (e.g. short heartbeats)
#[allow(dead_code)]
pub async fn spawn_server_with_config(config: Config) -> (AppState, SocketAddr) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let state = AppState::new(store, config.server.clone());
    let server = GatewayServer::with_state(config, state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure the server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;
    (state, addr)
}

/// Open a realtime connection for the given session id
#[allow(dead_code)]
pub async fn connect(addr: SocketAddr, session_id: &str) -> WsClient {
    let url = format!("ws://{addr}/ws/{session_id}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("failed to connect");
    ws
}

/// Poll until the registry reports the expected connection count
#[allow(dead_code)]
pub async fn wait_for_count(state: &AppState, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while state.registry.count().await != expected {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "registry never reached {expected} connections (now {})",
                state.registry.count().await
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[allow(dead_code)]
pub async fn send_json(ws: &mut WsClient, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON frame, skipping pings and pongs
#[allow(dead_code)]
pub async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("unexpected frame: {other:?}"),
            Some(Err(e)) => panic!("websocket error: {e}"),
            None => panic!("websocket closed"),
        }
    }
}

/// Next JSON frame, or None if nothing arrives in time
#[allow(dead_code)]
pub async fn recv_timeout(ws: &mut WsClient, duration: Duration) -> Option<Value> {
    tokio::time::timeout(duration, recv_json(ws)).await.ok()
}
