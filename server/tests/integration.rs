//! Integration tests for the zone server.
//!
//! These tests start a real server instance and connect via WebSocket
//! to verify end-to-end behavior.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use zone_shared::protocol::{ClientMsg, PacingDirection, ServerMsg, SnapshotMsg, PROTOCOL_VERSION};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a test server on a random available port and return the WebSocket URL.
async fn start_test_server() -> String {
    use zone_server::arena::Arena;
    use zone_server::config::ServerConfig;
    use zone_server::sim_loop::{run_sim_loop, SimBroadcast, SimCommand};
    use zone_server::ws::AppState;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Slow pacing keeps entities away from the zone for the test's lifetime
    let config = ServerConfig {
        listen_addr: addr.to_string(),
        broadcast_rate_hz: 20,
        rng_seed: 12345,
        initial_pacing_ms: 100,
        ..Default::default()
    };

    let arena = Arc::new(Arena::new(&config));
    let (sim_tx, sim_rx) = mpsc::channel::<SimCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<SimBroadcast>(64);

    let app_state = AppState {
        sim_tx,
        broadcast_tx: broadcast_tx.clone(),
    };

    tokio::spawn(async move {
        run_sim_loop(sim_rx, broadcast_tx, arena, config).await;
    });

    let app = axum::Router::new()
        .route("/ws", axum::routing::get(zone_server::ws::ws_handler))
        .with_state(app_state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("ws://{}/ws", addr)
}

/// Connect to the server and return the WebSocket stream.
async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

/// Read the next text message and parse as ServerMsg.
async fn recv_msg(ws: &mut WsStream) -> ServerMsg {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("Failed to parse server message");
            }
            Some(Ok(_)) => continue, // Skip ping/pong
            Some(Err(e)) => panic!("WebSocket error: {}", e),
            None => panic!("WebSocket closed unexpectedly"),
        }
    }
}

/// Read snapshots until one satisfies `done`, or panic after `timeout`.
async fn wait_for_snapshot(
    ws: &mut WsStream,
    timeout: Duration,
    done: impl Fn(&SnapshotMsg) -> bool,
) -> SnapshotMsg {
    tokio::time::timeout(timeout, async {
        loop {
            if let ServerMsg::Snapshot(snapshot) = recv_msg(ws).await {
                if done(&snapshot) {
                    return snapshot;
                }
            }
        }
    })
    .await
    .expect("Timed out waiting for snapshot")
}

async fn send_msg(ws: &mut WsStream, msg: &ClientMsg) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

#[tokio::test]
async fn test_connect_and_receive_welcome() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;

    match recv_msg(&mut ws).await {
        ServerMsg::Welcome(welcome) => {
            assert_eq!(welcome.protocol_version, PROTOCOL_VERSION);
            assert_eq!(welcome.geometry.min_occupancy, 2);
            assert_eq!(welcome.geometry.max_occupancy, 4);
            assert!(welcome.snapshot.entities.is_empty());
            assert_eq!(welcome.snapshot.count, 0);
        }
        other => panic!("Expected welcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spawned_entity_appears_in_snapshot() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    send_msg(&mut ws, &ClientMsg::Spawn).await;
    let snapshot = wait_for_snapshot(&mut ws, Duration::from_secs(5), |s| {
        !s.entities.is_empty()
    })
    .await;

    assert_eq!(snapshot.entities.len(), 1);
    let entity = &snapshot.entities[0];
    assert_eq!(entity.id, 1);
    assert_eq!(entity.radius, 5.0);
    let [x, y] = entity.pos;
    assert!((5.0..=495.0).contains(&x));
    assert!((5.0..=495.0).contains(&y));
}

#[tokio::test]
async fn test_spawns_from_any_client_are_seen_by_all() {
    let url = start_test_server().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    let _ = recv_msg(&mut a).await;
    let _ = recv_msg(&mut b).await;

    send_msg(&mut a, &ClientMsg::Spawn).await;
    send_msg(&mut b, &ClientMsg::Spawn).await;

    let seen = wait_for_snapshot(&mut b, Duration::from_secs(5), |s| s.entities.len() == 2).await;
    let ids: Vec<u32> = seen.entities.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2]);
    wait_for_snapshot(&mut a, Duration::from_secs(5), |s| s.entities.len() == 2).await;
}

#[tokio::test]
async fn test_adjust_pacing_is_broadcast() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    for _ in 0..3 {
        send_msg(
            &mut ws,
            &ClientMsg::AdjustPacing {
                direction: PacingDirection::Down,
            },
        )
        .await;
    }
    wait_for_snapshot(&mut ws, Duration::from_secs(5), |s| s.pacing_ms == 97).await;

    send_msg(
        &mut ws,
        &ClientMsg::AdjustPacing {
            direction: PacingDirection::Up,
        },
    )
    .await;
    wait_for_snapshot(&mut ws, Duration::from_secs(5), |s| s.pacing_ms == 98).await;
}

#[tokio::test]
async fn test_malformed_message_is_ignored() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"despawn","id":1}"#.into()))
        .await
        .unwrap();
    send_msg(&mut ws, &ClientMsg::Spawn).await;

    // Connection survives and the valid message still lands
    let snapshot =
        wait_for_snapshot(&mut ws, Duration::from_secs(5), |s| !s.entities.is_empty()).await;
    assert_eq!(snapshot.entities.len(), 1);
}

#[tokio::test]
async fn test_wire_format_uses_documented_tags() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;

    let text = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => break text.to_string(),
            Some(Ok(_)) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "welcome");
    assert!(value["protocolVersion"].is_u64());
    assert_eq!(value["snapshot"]["pacingMs"], 100);
    assert_eq!(value["geometry"]["maxOccupancy"], 4);

    ws.send(Message::Text(r#"{"type":"spawn"}"#.into()))
        .await
        .unwrap();
    let raw = loop {
        if let Some(Ok(Message::Text(text))) = ws.next().await {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["type"] == "snapshot" && !value["entities"].as_array().unwrap().is_empty() {
                break value;
            }
        }
    };
    let entity = &raw["entities"][0];
    assert_eq!(entity["id"], 1);
    assert!(entity["pos"].is_array());
    assert!(entity["phase"].is_string());
    assert!(entity["inside"].is_boolean());
}
