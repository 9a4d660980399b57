//! End-to-end tests for the realtime sync endpoint

mod common;

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use syncpad_core::Config;

use common::{
    connect, recv_json, recv_timeout, send_json, spawn_server, spawn_server_with_config,
    wait_for_count,
};

#[tokio::test]
async fn edit_reaches_other_session_but_not_sender() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    send_json(&mut a, &json!({"type": "edit", "data": {"x": 1}})).await;

    let received = recv_json(&mut b).await;
    assert_eq!(received["type"], "edit");
    assert_eq!(received["data"], json!({"x": 1}));
    assert_eq!(received["session_id"], "A");
    assert!(received["timestamp"].is_string());

    // The sender never sees its own edit echoed back
    assert!(recv_timeout(&mut a, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn disconnect_notifies_remaining_sessions() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    b.close(None).await.unwrap();

    let notice = recv_json(&mut a).await;
    assert_eq!(notice["type"], "user_disconnected");
    assert_eq!(notice["session_id"], "B");
    wait_for_count(&state, 1).await;
}

#[tokio::test]
async fn count_follows_connects_and_disconnects() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    let _c = connect(addr, "C").await;
    wait_for_count(&state, 3).await;

    a.close(None).await.unwrap();
    b.close(None).await.unwrap();
    wait_for_count(&state, 1).await;
}

#[tokio::test]
async fn missing_fields_travel_as_null() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    send_json(&mut a, &json!({})).await;

    let received = recv_json(&mut b).await;
    assert!(received["type"].is_null());
    assert!(received["data"].is_null());
    assert_eq!(received["session_id"], "A");
}

#[tokio::test]
async fn malformed_frame_closes_the_connection() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    use futures_util::SinkExt;
    a.send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();

    // The others are told A is gone, exactly as on a graceful close
    let notice = recv_json(&mut b).await;
    assert_eq!(notice["type"], "user_disconnected");
    assert_eq!(notice["session_id"], "A");
    wait_for_count(&state, 1).await;

    // A's connection is terminated, never served further frames
    match a.next().await {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn binary_frame_closes_the_connection() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    use futures_util::SinkExt;
    a.send(Message::Binary(vec![0u8, 1, 2].into())).await.unwrap();

    // Same cleanup as a malformed text frame
    let notice = recv_json(&mut b).await;
    assert_eq!(notice["type"], "user_disconnected");
    assert_eq!(notice["session_id"], "A");
    wait_for_count(&state, 1).await;

    match a.next().await {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn idle_connection_is_dropped_after_heartbeat_timeout() {
    let mut config = Config::default();
    config.server.heartbeat_interval_secs = 1;
    config.server.heartbeat_timeout_secs = 2;
    let (state, addr) = spawn_server_with_config(config).await;

    // A never reads its socket, so the server's pings go unanswered
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    // B keeps reading; the client answers pings, so B stays within the
    // timeout while A goes silent and gets dropped
    let notice = recv_json(&mut b).await;
    assert_eq!(notice["type"], "user_disconnected");
    assert_eq!(notice["session_id"], "A");
    wait_for_count(&state, 1).await;

    // A's socket is closed once we drain the buffered pings
    loop {
        match a.next().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn two_tabs_with_same_session_id() {
    let (state, addr) = spawn_server().await;
    let mut tab1 = connect(addr, "shared").await;
    let mut tab2 = connect(addr, "shared").await;
    let mut other = connect(addr, "other").await;
    wait_for_count(&state, 3).await;

    send_json(&mut tab1, &json!({"type": "edit", "data": {"y": 2}})).await;

    // Everyone carrying the sender's session id is excluded
    let received = recv_json(&mut other).await;
    assert_eq!(received["session_id"], "shared");
    assert!(recv_timeout(&mut tab2, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn broadcasts_are_ordered_per_sender() {
    let (state, addr) = spawn_server().await;
    let mut a = connect(addr, "A").await;
    let mut b = connect(addr, "B").await;
    wait_for_count(&state, 2).await;

    for i in 0..5 {
        send_json(&mut a, &json!({"type": "edit", "data": {"seq": i}})).await;
    }

    for i in 0..5 {
        let received = recv_json(&mut b).await;
        assert_eq!(received["data"]["seq"], i);
    }
}
