use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::sim_loop::{SimBroadcast, SimCommand};
use zone_shared::protocol::{ClientMsg, ServerMsg};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub sim_tx: mpsc::Sender<SimCommand>,
    pub broadcast_tx: broadcast::Sender<SimBroadcast>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before joining so no snapshot after the welcome is missed
    let mut broadcast_rx = app_state.broadcast_tx.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .sim_tx
        .send(SimCommand::ClientJoin { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send ClientJoin command");
        return;
    }

    let (my_id, welcome) = match resp_rx.await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };

    tracing::info!("Client {} connected", my_id);

    match serde_json::to_string(&ServerMsg::Welcome(welcome)) {
        Ok(json) => {
            if sink.send(Message::Text(json.into())).await.is_err() {
                leave(&app_state, my_id).await;
                return;
            }
        }
        Err(e) => {
            tracing::error!("Failed to encode welcome: {}", e);
            leave(&app_state, my_id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let cmd = match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(ClientMsg::Spawn) => SimCommand::Spawn,
                            Ok(ClientMsg::AdjustPacing { direction }) => {
                                SimCommand::AdjustPacing { direction }
                            }
                            Err(e) => {
                                tracing::debug!("Client {} sent unreadable message: {}", my_id, e);
                                continue;
                            }
                        };
                        if app_state.sim_tx.send(cmd).await.is_err() {
                            tracing::error!("Simulation loop is gone");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(SimBroadcast::Snapshot(msg)) => {
                        if let Ok(json) = serde_json::to_string(&ServerMsg::Snapshot(msg)) {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Client {} lagged by {} snapshots", my_id, n);
                        // Snapshots are full state, skipping some is fine
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    leave(&app_state, my_id).await;
    tracing::info!("Client {} disconnected", my_id);
}

async fn leave(app_state: &AppState, id: u32) {
    let _ = app_state.sim_tx.send(SimCommand::ClientLeave { id }).await;
}
